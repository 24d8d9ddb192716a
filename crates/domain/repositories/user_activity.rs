use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    goals::GoalEntity, journal_entries::JournalEntryEntity, milestones::MilestoneEntity,
};

/// Read access to the product tables email content is generated from.
#[async_trait]
#[automock]
pub trait UserActivityRepository {
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<GoalEntity>>;

    async fn list_open_milestones_due_before(
        &self,
        user_id: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<MilestoneEntity>>;

    async fn list_journal_entries_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JournalEntryEntity>>;
}
