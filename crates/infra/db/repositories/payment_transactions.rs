use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{dsl::exists, insert_into, prelude::*, select};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_transactions},
};
use domain::{
    entities::payment_transactions::InsertPaymentTransactionEntity,
    repositories::payment_transactions::PaymentTransactionRepository,
};

pub struct PaymentTransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentTransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentTransactionRepository for PaymentTransactionPostgres {
    async fn record(&self, transaction: InsertPaymentTransactionEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let id = insert_into(payment_transactions::table)
            .values(&transaction)
            .returning(payment_transactions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(id)
    }

    async fn exists_by_idempotency_key(&self, idempotency_key: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let found = select(exists(
            payment_transactions::table
                .filter(payment_transactions::idempotency_key.eq(idempotency_key)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(found)
    }
}
