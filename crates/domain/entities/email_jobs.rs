use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::email_jobs;

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = email_jobs)]
pub struct EmailJobEntity {
    pub id: Uuid,
    pub job_type: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub status: String,
    pub priority: i32,
    pub scheduled_for: DateTime<Utc>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub job_data: Value,
    pub worker_id: Option<String>,
    pub processing_time_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = email_jobs)]
pub struct InsertEmailJobEntity {
    pub job_type: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub status: String,
    pub priority: i32,
    pub scheduled_for: DateTime<Utc>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub job_data: Value,
}
