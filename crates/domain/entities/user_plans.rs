use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{payment_statuses::PaymentStatus, plan_types::PlanType},
    infra::db::postgres::schema::user_plans,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_plans)]
pub struct UserPlanEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_type: String,
    pub payment_status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub failed_payment_count: i32,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPlanEntity {
    pub fn plan_type(&self) -> PlanType {
        PlanType::from_str(&self.plan_type)
    }

    pub fn payment_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_str(&self.payment_status)
    }
}

/// Partial update of the payment columns. `None` leaves a column untouched; the nested
/// `Option` on nullable columns lets callers write NULL explicitly.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = user_plans)]
pub struct UserPlanPaymentChangeset {
    pub payment_status: Option<String>,
    pub failed_payment_count: Option<i32>,
    pub grace_period_end: Option<Option<DateTime<Utc>>>,
    pub last_payment_date: Option<Option<DateTime<Utc>>>,
    pub next_payment_date: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}
