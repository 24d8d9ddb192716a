use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{insert_into, prelude::*};

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::worker_statuses},
};
use domain::{
    entities::worker_statuses::UpsertWorkerStatusEntity,
    repositories::worker_statuses::WorkerStatusRepository,
};

pub struct WorkerStatusPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WorkerStatusPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WorkerStatusRepository for WorkerStatusPostgres {
    async fn upsert(&self, status: UpsertWorkerStatusEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(worker_statuses::table)
            .values(&status)
            .on_conflict(worker_statuses::worker_id)
            .do_update()
            .set(&status)
            .execute(&mut conn)?;

        Ok(())
    }
}
