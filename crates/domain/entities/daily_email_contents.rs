use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::daily_email_contents;

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = daily_email_contents)]
pub struct UpsertDailyEmailContentEntity {
    pub user_id: Uuid,
    pub content_date: NaiveDate,
    pub journal_prompt: String,
    pub goal_summary: String,
    pub business_insights: Value,
    pub milestone_reminders: Value,
    pub sentiment_overall: String,
    pub sentiment_trend: String,
    pub updated_at: DateTime<Utc>,
}
