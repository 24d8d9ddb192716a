use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_plans::{UserPlanEntity, UserPlanPaymentChangeset};

#[async_trait]
#[automock]
pub trait UserPlanRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<UserPlanEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserPlanEntity>>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserPlanEntity>>;

    async fn update_payment_state(
        &self,
        user_id: Uuid,
        changeset: UserPlanPaymentChangeset,
    ) -> Result<UserPlanEntity>;

    /// Applies `changeset` only while the plan is still in grace_period with an end at or
    /// before `now`. Returns `None` when the plan no longer matches.
    async fn suspend_if_grace_expired(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        changeset: UserPlanPaymentChangeset,
    ) -> Result<Option<UserPlanEntity>>;

    /// Plans in grace_period whose grace_period_end is at or before `now`.
    async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<UserPlanEntity>>;

    async fn list_in_grace_period(&self) -> Result<Vec<UserPlanEntity>>;

    async fn count_by_payment_status(&self) -> Result<Vec<(String, i64)>>;
}
