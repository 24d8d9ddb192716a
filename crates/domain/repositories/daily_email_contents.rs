use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::daily_email_contents::UpsertDailyEmailContentEntity;

#[async_trait]
#[automock]
pub trait DailyEmailContentRepository {
    /// Insert or replace the bundle for (user_id, content_date).
    async fn upsert(&self, content: UpsertDailyEmailContentEntity) -> Result<()>;
}
