use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::journal_entries;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = journal_entries)]
pub struct JournalEntryEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub sentiment: Option<String>,
    pub created_at: DateTime<Utc>,
}
