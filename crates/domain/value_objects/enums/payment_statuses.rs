use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Payment state of a user's plan. Drives premium feature gating on the client.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Active,
    Pending,
    Failed,
    Cancelled,
    Suspended,
    GracePeriod,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Active => "active",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Suspended => "suspended",
            PaymentStatus::GracePeriod => "grace_period",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "active" => Some(PaymentStatus::Active),
            "pending" => Some(PaymentStatus::Pending),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "suspended" => Some(PaymentStatus::Suspended),
            "grace_period" => Some(PaymentStatus::GracePeriod),
            _ => None,
        }
    }

    pub fn all() -> [PaymentStatus; 6] {
        [
            PaymentStatus::Active,
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Suspended,
            PaymentStatus::GracePeriod,
        ]
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
