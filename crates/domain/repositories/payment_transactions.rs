use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_transactions::InsertPaymentTransactionEntity;

#[async_trait]
#[automock]
pub trait PaymentTransactionRepository {
    async fn record(&self, transaction: InsertPaymentTransactionEntity) -> Result<Uuid>;

    async fn exists_by_idempotency_key(&self, idempotency_key: &str) -> Result<bool>;
}
