use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{insert_into, prelude::*};

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::email_analytics},
};
use domain::{
    entities::email_analytics::InsertEmailAnalyticsEntity,
    repositories::email_analytics::EmailAnalyticsRepository,
};

pub struct EmailAnalyticsPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EmailAnalyticsPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EmailAnalyticsRepository for EmailAnalyticsPostgres {
    async fn record(&self, event: InsertEmailAnalyticsEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(email_analytics::table)
            .values(&event)
            .execute(&mut conn)?;

        Ok(())
    }
}
