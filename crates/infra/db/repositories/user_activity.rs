use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{goals, journal_entries, milestones},
    },
};
use domain::{
    entities::{
        goals::GoalEntity, journal_entries::JournalEntryEntity, milestones::MilestoneEntity,
    },
    repositories::user_activity::UserActivityRepository,
};

pub struct UserActivityPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserActivityPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserActivityRepository for UserActivityPostgres {
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<GoalEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = goals::table
            .filter(goals::user_id.eq(user_id))
            .order(goals::created_at.desc())
            .select(GoalEntity::as_select())
            .load::<GoalEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_open_milestones_due_before(
        &self,
        user_id: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<MilestoneEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = milestones::table
            .filter(milestones::user_id.eq(user_id))
            .filter(milestones::completed.eq(false))
            .filter(milestones::due_date.le(due_before))
            .order(milestones::due_date.asc())
            .select(MilestoneEntity::as_select())
            .load::<MilestoneEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_journal_entries_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JournalEntryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = journal_entries::table
            .filter(journal_entries::user_id.eq(user_id))
            .filter(journal_entries::created_at.ge(since))
            .order(journal_entries::created_at.desc())
            .limit(limit)
            .select(JournalEntryEntity::as_select())
            .load::<JournalEntryEntity>(&mut conn)?;

        Ok(results)
    }
}
