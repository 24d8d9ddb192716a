use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payment_transactions;

#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_transactions)]
pub struct PaymentTransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub transaction_type: String,
    pub payment_method: Option<String>,
    pub processor_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payment_transactions)]
pub struct InsertPaymentTransactionEntity {
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub transaction_type: String,
    pub payment_method: Option<String>,
    pub processor_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}
