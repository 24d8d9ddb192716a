use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{insert_into, prelude::*};

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::daily_email_contents},
};
use domain::{
    entities::daily_email_contents::UpsertDailyEmailContentEntity,
    repositories::daily_email_contents::DailyEmailContentRepository,
};

pub struct DailyEmailContentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DailyEmailContentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DailyEmailContentRepository for DailyEmailContentPostgres {
    async fn upsert(&self, content: UpsertDailyEmailContentEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(daily_email_contents::table)
            .values(&content)
            .on_conflict((
                daily_email_contents::user_id,
                daily_email_contents::content_date,
            ))
            .do_update()
            .set(&content)
            .execute(&mut conn)?;

        Ok(())
    }
}
