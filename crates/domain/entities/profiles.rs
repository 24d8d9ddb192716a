use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::profiles;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = profiles)]
pub struct ProfileEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub is_admin: bool,
    pub daily_email_enabled: bool,
    pub daily_email_hour: i32,
    pub created_at: DateTime<Utc>,
}
