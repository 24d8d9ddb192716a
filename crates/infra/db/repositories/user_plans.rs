use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{dsl::count_star, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_plans},
};
use domain::{
    entities::user_plans::{UserPlanEntity, UserPlanPaymentChangeset},
    repositories::user_plans::UserPlanRepository,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub struct UserPlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserPlanRepository for UserPlanPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = user_plans::table
            .filter(user_plans::user_id.eq(user_id))
            .select(UserPlanEntity::as_select())
            .first::<UserPlanEntity>(&mut conn)
            .optional()?;

        Ok(plan)
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = user_plans::table
            .filter(user_plans::stripe_customer_id.eq(stripe_customer_id))
            .select(UserPlanEntity::as_select())
            .first::<UserPlanEntity>(&mut conn)
            .optional()?;

        Ok(plan)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = user_plans::table
            .filter(user_plans::stripe_subscription_id.eq(stripe_subscription_id))
            .select(UserPlanEntity::as_select())
            .first::<UserPlanEntity>(&mut conn)
            .optional()?;

        Ok(plan)
    }

    async fn update_payment_state(
        &self,
        user_id: Uuid,
        changeset: UserPlanPaymentChangeset,
    ) -> Result<UserPlanEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = update(user_plans::table.filter(user_plans::user_id.eq(user_id)))
            .set(&changeset)
            .returning(UserPlanEntity::as_select())
            .get_result::<UserPlanEntity>(&mut conn)?;

        Ok(plan)
    }

    async fn suspend_if_grace_expired(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        changeset: UserPlanPaymentChangeset,
    ) -> Result<Option<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = update(
            user_plans::table
                .filter(user_plans::user_id.eq(user_id))
                .filter(user_plans::payment_status.eq(PaymentStatus::GracePeriod.as_str()))
                .filter(user_plans::grace_period_end.le(now)),
        )
        .set(&changeset)
        .returning(UserPlanEntity::as_select())
        .get_result::<UserPlanEntity>(&mut conn)
        .optional()?;

        Ok(plan)
    }

    async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plans = user_plans::table
            .filter(user_plans::payment_status.eq(PaymentStatus::GracePeriod.as_str()))
            .filter(user_plans::grace_period_end.le(now))
            .order(user_plans::grace_period_end.asc())
            .select(UserPlanEntity::as_select())
            .load::<UserPlanEntity>(&mut conn)?;

        Ok(plans)
    }

    async fn list_in_grace_period(&self) -> Result<Vec<UserPlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plans = user_plans::table
            .filter(user_plans::payment_status.eq(PaymentStatus::GracePeriod.as_str()))
            .order(user_plans::grace_period_end.asc())
            .select(UserPlanEntity::as_select())
            .load::<UserPlanEntity>(&mut conn)?;

        Ok(plans)
    }

    async fn count_by_payment_status(&self) -> Result<Vec<(String, i64)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let counts = user_plans::table
            .group_by(user_plans::payment_status)
            .select((user_plans::payment_status, count_star()))
            .order(user_plans::payment_status.asc())
            .load::<(String, i64)>(&mut conn)?;

        Ok(counts)
    }
}
