use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmailJobType {
    DailyDigest,
    GoalReminder,
    MilestoneAlert,
}

impl EmailJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailJobType::DailyDigest => "daily_digest",
            EmailJobType::GoalReminder => "goal_reminder",
            EmailJobType::MilestoneAlert => "milestone_alert",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "daily_digest" => Some(EmailJobType::DailyDigest),
            "goal_reminder" => Some(EmailJobType::GoalReminder),
            "milestone_alert" => Some(EmailJobType::MilestoneAlert),
            _ => None,
        }
    }

    /// Priority used when a job spec does not carry one. Time-sensitive mail goes first.
    pub fn default_priority(&self) -> i32 {
        match self {
            EmailJobType::DailyDigest => 1,
            EmailJobType::GoalReminder => 2,
            EmailJobType::MilestoneAlert => 3,
        }
    }
}

impl Display for EmailJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
