use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::worker_statuses;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = worker_statuses, primary_key(worker_id))]
pub struct WorkerStatusEntity {
    pub worker_id: String,
    pub status: String,
    pub jobs_processed_today: i32,
    pub error_count: i32,
    pub last_heartbeat: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written on startup, on every heartbeat tick and on shutdown.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = worker_statuses)]
pub struct UpsertWorkerStatusEntity {
    pub worker_id: String,
    pub status: String,
    pub jobs_processed_today: i32,
    pub error_count: i32,
    pub last_heartbeat: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
