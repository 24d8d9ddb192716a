use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::email_analytics;

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = email_analytics)]
pub struct InsertEmailAnalyticsEntity {
    pub user_id: Uuid,
    pub email_job_id: Option<Uuid>,
    pub email_type: String,
    pub event: String,
    pub metadata: Value,
}
