use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::worker_statuses::UpsertWorkerStatusEntity;

#[async_trait]
#[automock]
pub trait WorkerStatusRepository {
    async fn upsert(&self, status: UpsertWorkerStatusEntity) -> Result<()>;
}
