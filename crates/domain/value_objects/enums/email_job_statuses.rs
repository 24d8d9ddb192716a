use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmailJobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl EmailJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailJobStatus::Pending => "pending",
            EmailJobStatus::Processing => "processing",
            EmailJobStatus::Completed => "completed",
            EmailJobStatus::Failed => "failed",
            EmailJobStatus::Retrying => "retrying",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EmailJobStatus::Pending),
            "processing" => Some(EmailJobStatus::Processing),
            "completed" => Some(EmailJobStatus::Completed),
            "failed" => Some(EmailJobStatus::Failed),
            "retrying" => Some(EmailJobStatus::Retrying),
            _ => None,
        }
    }

    /// Statuses the poller may claim once `scheduled_for` has passed.
    pub fn claimable() -> [EmailJobStatus; 2] {
        [EmailJobStatus::Pending, EmailJobStatus::Retrying]
    }
}

impl Display for EmailJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
