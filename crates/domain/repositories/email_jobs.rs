use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::email_jobs::{EmailJobEntity, InsertEmailJobEntity},
    value_objects::email_jobs::QueueStats,
};

#[async_trait]
#[automock]
pub trait EmailJobRepository {
    /// Inserts all rows in one statement and returns how many were written.
    async fn enqueue_batch(&self, jobs: Vec<InsertEmailJobEntity>) -> Result<usize>;

    /// Locks up to `limit` due jobs (pending or retrying), skipping rows locked by other
    /// workers, and flips them to processing for `worker_id`.
    async fn claim_due_jobs(
        &self,
        worker_id: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmailJobEntity>>;

    /// The `mark_*` updates only touch the job while `worker_id` still owns it and return
    /// whether a row was written.
    async fn mark_completed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        processing_time_ms: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn mark_retrying(
        &self,
        job_id: Uuid,
        worker_id: &str,
        retry_count: i32,
        error_message: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        retry_count: i32,
        error_message: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Resets jobs stuck in processing since before `started_before` back to pending.
    async fn release_stale_processing(&self, started_before: DateTime<Utc>) -> Result<usize>;

    async fn queue_stats(&self) -> Result<QueueStats>;
}
