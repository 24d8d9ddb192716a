use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Kind of plan state transition recorded in the `payment_transactions` audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    GracePeriodStart,
    GracePeriodExtension,
    AccountSuspension,
    AccountRestoration,
    SubscriptionCancellation,
    SubscriptionReactivation,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::GracePeriodStart => "grace_period_start",
            TransactionType::GracePeriodExtension => "grace_period_extension",
            TransactionType::AccountSuspension => "account_suspension",
            TransactionType::AccountRestoration => "account_restoration",
            TransactionType::SubscriptionCancellation => "subscription_cancellation",
            TransactionType::SubscriptionReactivation => "subscription_reactivation",
            TransactionType::Payment => "payment",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
