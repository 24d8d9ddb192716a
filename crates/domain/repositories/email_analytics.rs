use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::email_analytics::InsertEmailAnalyticsEntity;

#[async_trait]
#[automock]
pub trait EmailAnalyticsRepository {
    async fn record(&self, event: InsertEmailAnalyticsEntity) -> Result<()>;
}
