use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::user_plans::UserPlanEntity,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub const GRACE_PERIOD_DAYS: i64 = 7;
pub const BILLING_CYCLE_DAYS: i64 = 30;
pub const MAX_EXTENSION_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GracePeriodStatus {
    pub is_in_grace_period: bool,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub days_remaining: i64,
    pub failed_payment_count: i32,
    pub payment_status: Option<PaymentStatus>,
}

impl GracePeriodStatus {
    pub fn from_plan(plan: &UserPlanEntity, now: DateTime<Utc>) -> Self {
        let in_grace_status = plan.payment_status() == Some(PaymentStatus::GracePeriod);
        let is_in_grace_period = in_grace_status && plan.grace_period_end.is_some_and(|end| end > now);

        Self {
            is_in_grace_period,
            grace_period_end: plan.grace_period_end,
            days_remaining: plan
                .grace_period_end
                .map(|end| days_remaining(end, now))
                .unwrap_or(0),
            failed_payment_count: plan.failed_payment_count,
            payment_status: plan.payment_status(),
        }
    }
}

/// Whole days left until `end`, rounded up, never negative.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (end - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    let day_ms = Duration::days(1).num_milliseconds();
    (remaining_ms + day_ms - 1) / day_ms
}

/// Result of a successful plan transition, returned to HTTP callers as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GracePeriodOutcome {
    pub success: bool,
    pub message: String,
    pub user_id: Uuid,
    pub payment_status: String,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub failed_payment_count: i32,
}

impl GracePeriodOutcome {
    pub fn from_plan(message: impl Into<String>, plan: &UserPlanEntity) -> Self {
        Self {
            success: true,
            message: message.into(),
            user_id: plan.user_id,
            payment_status: plan.payment_status.clone(),
            grace_period_end: plan.grace_period_end,
            failed_payment_count: plan.failed_payment_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpiredGracePeriodsResult {
    pub processed: usize,
    pub suspended: usize,
    pub skipped: usize,
    pub errors: Vec<SweepRowError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRowError {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GracePeriodOverview {
    pub status_counts: Vec<PaymentStatusCount>,
    pub in_grace_period: Vec<GracePeriodUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusCount {
    pub payment_status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GracePeriodUser {
    pub user_id: Uuid,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub days_remaining: i64,
    pub failed_payment_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(status: &str, end: Option<DateTime<Utc>>) -> UserPlanEntity {
        let now = Utc::now();
        UserPlanEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_type: "premium".to_string(),
            payment_status: status.to_string(),
            expires_at: None,
            failed_payment_count: 2,
            grace_period_end: end,
            last_payment_date: None,
            next_payment_date: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn days_remaining_rounds_up_partial_days() {
        let now = Utc::now();
        assert_eq!(days_remaining(now + Duration::hours(1), now), 1);
        assert_eq!(days_remaining(now + Duration::days(7), now), 7);
        assert_eq!(days_remaining(now + Duration::days(6) + Duration::minutes(1), now), 7);
    }

    #[test]
    fn days_remaining_floors_at_zero() {
        let now = Utc::now();
        assert_eq!(days_remaining(now, now), 0);
        assert_eq!(days_remaining(now - Duration::days(3), now), 0);
    }

    #[test]
    fn status_reports_active_grace_window() {
        let now = Utc::now();
        let status = GracePeriodStatus::from_plan(
            &plan("grace_period", Some(now + Duration::days(3))),
            now,
        );

        assert!(status.is_in_grace_period);
        assert_eq!(status.days_remaining, 3);
        assert_eq!(status.failed_payment_count, 2);
    }

    #[test]
    fn elapsed_or_foreign_status_is_not_in_grace_period() {
        let now = Utc::now();

        let elapsed =
            GracePeriodStatus::from_plan(&plan("grace_period", Some(now - Duration::hours(1))), now);
        assert!(!elapsed.is_in_grace_period);
        assert_eq!(elapsed.days_remaining, 0);

        let suspended = GracePeriodStatus::from_plan(&plan("suspended", None), now);
        assert!(!suspended.is_in_grace_period);
        assert_eq!(suspended.payment_status, Some(PaymentStatus::Suspended));
    }
}
