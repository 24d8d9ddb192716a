use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::profiles::ProfileEntity;

#[async_trait]
#[automock]
pub trait ProfileRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<ProfileEntity>>;

    /// Profiles opted into the daily digest at `hour` (UTC) that have an email address.
    async fn list_digest_recipients(&self, hour: i32) -> Result<Vec<ProfileEntity>>;
}
