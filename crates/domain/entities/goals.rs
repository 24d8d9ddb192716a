use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::goals;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = goals)]
pub struct GoalEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub category: Option<String>,
    pub status: String,
    pub progress: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoalEntity {
    pub fn is_completed(&self) -> bool {
        self.status == "completed" || self.progress >= 100
    }

    pub fn is_active(&self) -> bool {
        self.status == "active" && self.progress < 100
    }
}
