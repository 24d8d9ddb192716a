use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{dsl::count_star, dsl::min, insert_into, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::email_jobs},
};
use domain::{
    entities::email_jobs::{EmailJobEntity, InsertEmailJobEntity},
    repositories::email_jobs::EmailJobRepository,
    value_objects::{email_jobs::QueueStats, enums::email_job_statuses::EmailJobStatus},
};

pub struct EmailJobPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EmailJobPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EmailJobRepository for EmailJobPostgres {
    async fn enqueue_batch(&self, jobs: Vec<InsertEmailJobEntity>) -> Result<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(email_jobs::table)
            .values(&jobs)
            .execute(&mut conn)?;

        Ok(inserted)
    }

    async fn claim_due_jobs(
        &self,
        worker_id: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmailJobEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let claimable: Vec<&str> = EmailJobStatus::claimable()
            .iter()
            .map(|status| status.as_str())
            .collect();

        let claimed = conn.transaction::<Vec<EmailJobEntity>, diesel::result::Error, _>(|conn| {
            let candidate_ids: Vec<Uuid> = email_jobs::table
                .filter(email_jobs::status.eq_any(claimable))
                .filter(email_jobs::scheduled_for.le(now))
                .order((email_jobs::priority.desc(), email_jobs::scheduled_for.asc()))
                .limit(limit)
                .select(email_jobs::id)
                .for_update()
                .skip_locked()
                .load::<Uuid>(conn)?;

            if candidate_ids.is_empty() {
                return Ok(Vec::new());
            }

            let mut claimed = update(email_jobs::table.filter(email_jobs::id.eq_any(candidate_ids)))
                .set((
                    email_jobs::status.eq(EmailJobStatus::Processing.as_str()),
                    email_jobs::started_at.eq(Some(now)),
                    email_jobs::worker_id.eq(Some(worker_id)),
                ))
                .returning(EmailJobEntity::as_select())
                .get_results::<EmailJobEntity>(conn)?;

            // RETURNING order is unspecified.
            claimed.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.scheduled_for.cmp(&b.scheduled_for))
            });
            Ok(claimed)
        })?;

        Ok(claimed)
    }

    async fn mark_completed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        processing_time_ms: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            email_jobs::table
                .find(job_id)
                .filter(email_jobs::worker_id.eq(worker_id)),
        )
        .set((
            email_jobs::status.eq(EmailJobStatus::Completed.as_str()),
            email_jobs::completed_at.eq(Some(completed_at)),
            email_jobs::processing_time_ms.eq(Some(processing_time_ms)),
            email_jobs::error_message.eq::<Option<String>>(None),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn mark_retrying(
        &self,
        job_id: Uuid,
        worker_id: &str,
        retry_count: i32,
        error_message: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            email_jobs::table
                .find(job_id)
                .filter(email_jobs::worker_id.eq(worker_id)),
        )
        .set((
            email_jobs::status.eq(EmailJobStatus::Retrying.as_str()),
            email_jobs::retry_count.eq(retry_count),
            email_jobs::error_message.eq(Some(error_message)),
            email_jobs::scheduled_for.eq(next_run_at),
            email_jobs::worker_id.eq::<Option<String>>(None),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        retry_count: i32,
        error_message: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            email_jobs::table
                .find(job_id)
                .filter(email_jobs::worker_id.eq(worker_id)),
        )
        .set((
            email_jobs::status.eq(EmailJobStatus::Failed.as_str()),
            email_jobs::retry_count.eq(retry_count),
            email_jobs::error_message.eq(Some(error_message)),
            email_jobs::failed_at.eq(Some(failed_at)),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn release_stale_processing(&self, started_before: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let released = update(
            email_jobs::table
                .filter(email_jobs::status.eq(EmailJobStatus::Processing.as_str()))
                .filter(email_jobs::started_at.lt(started_before)),
        )
        .set((
            email_jobs::status.eq(EmailJobStatus::Pending.as_str()),
            email_jobs::started_at.eq::<Option<DateTime<Utc>>>(None),
            email_jobs::worker_id.eq::<Option<String>>(None),
        ))
        .execute(&mut conn)?;

        Ok(released)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let counts: BTreeMap<String, i64> = email_jobs::table
            .group_by(email_jobs::status)
            .select((email_jobs::status, count_star()))
            .load::<(String, i64)>(&mut conn)?
            .into_iter()
            .collect();

        let oldest_due_at = email_jobs::table
            .filter(email_jobs::status.eq(EmailJobStatus::Pending.as_str()))
            .select(min(email_jobs::scheduled_for))
            .first::<Option<DateTime<Utc>>>(&mut conn)?;

        Ok(QueueStats::from_counts(&counts, oldest_due_at))
    }
}
