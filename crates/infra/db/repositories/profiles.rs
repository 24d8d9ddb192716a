use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::profiles},
};
use domain::{entities::profiles::ProfileEntity, repositories::profiles::ProfileRepository};

pub struct ProfilePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProfilePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProfileRepository for ProfilePostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<ProfileEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let profile = profiles::table
            .find(user_id)
            .select(ProfileEntity::as_select())
            .first::<ProfileEntity>(&mut conn)
            .optional()?;

        Ok(profile)
    }

    async fn list_digest_recipients(&self, hour: i32) -> Result<Vec<ProfileEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let recipients = profiles::table
            .filter(profiles::daily_email_enabled.eq(true))
            .filter(profiles::daily_email_hour.eq(hour))
            .filter(profiles::email.is_not_null())
            .order(profiles::created_at.asc())
            .select(ProfileEntity::as_select())
            .load::<ProfileEntity>(&mut conn)?;

        Ok(recipients)
    }
}
