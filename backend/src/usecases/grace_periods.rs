use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        payment_transactions::InsertPaymentTransactionEntity,
        user_plans::{UserPlanEntity, UserPlanPaymentChangeset},
    },
    repositories::{
        payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
    },
    value_objects::{
        clock::Clock,
        enums::{
            payment_statuses::PaymentStatus, transaction_statuses::TransactionStatus,
            transaction_types::TransactionType,
        },
        grace_periods::{
            BILLING_CYCLE_DAYS, ExpiredGracePeriodsResult, GRACE_PERIOD_DAYS, GracePeriodOutcome,
            GracePeriodOverview, GracePeriodStatus, GracePeriodUser, MAX_EXTENSION_DAYS,
            PaymentStatusCount, SweepRowError, days_remaining,
        },
    },
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GracePeriodError {
    #[error("no plan found for user {0}")]
    PlanNotFound(Uuid),
    #[error("{0}")]
    NotEligible(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GracePeriodError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            GracePeriodError::PlanNotFound(_) => StatusCode::NOT_FOUND,
            GracePeriodError::NotEligible(_) | GracePeriodError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            GracePeriodError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, GracePeriodError>;

/// Amount and reference attached to a successful payment, when the processor provides them.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    pub amount_minor: i64,
    pub currency: Option<String>,
    pub processor_reference: Option<String>,
}

struct AuditEntry {
    user_id: Uuid,
    status: TransactionStatus,
    transaction_type: TransactionType,
    amount_minor: i64,
    currency: Option<String>,
    processor_reference: Option<String>,
    failure_reason: Option<String>,
    idempotency_key: Option<String>,
    metadata: Value,
}

impl AuditEntry {
    fn new(user_id: Uuid, status: TransactionStatus, transaction_type: TransactionType) -> Self {
        Self {
            user_id,
            status,
            transaction_type,
            amount_minor: 0,
            currency: None,
            processor_reference: None,
            failure_reason: None,
            idempotency_key: None,
            metadata: json!({}),
        }
    }
}

pub struct GracePeriodUseCase<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    plan_repo: Arc<U>,
    transaction_repo: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<U, T> GracePeriodUseCase<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<U>, transaction_repo: Arc<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            plan_repo,
            transaction_repo,
            clock,
        }
    }

    pub async fn start_grace_period(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        idempotency_key: Option<String>,
    ) -> UseCaseResult<GracePeriodOutcome> {
        info!(%user_id, "grace_period: start requested");

        if let Some(plan) = self.replayed(user_id, idempotency_key.as_deref()).await? {
            return Ok(GracePeriodOutcome::from_plan(
                "Request already processed; grace period unchanged",
                &plan,
            ));
        }

        let plan = self.load_plan(user_id).await?;
        if !plan.plan_type().allows_grace_period() {
            warn!(%user_id, plan_type = %plan.plan_type, "grace_period: plan not eligible");
            return Err(GracePeriodError::NotEligible(format!(
                "Grace period is only available for premium plans (current plan: {})",
                plan.plan_type
            )));
        }

        let now = self.clock.now();
        let grace_period_end = grace_period_end_from(now);
        let failed_payment_count = plan.failed_payment_count.saturating_add(1);

        let updated = self
            .apply(
                user_id,
                UserPlanPaymentChangeset {
                    payment_status: Some(PaymentStatus::GracePeriod.to_string()),
                    failed_payment_count: Some(failed_payment_count),
                    grace_period_end: Some(Some(grace_period_end)),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        let mut audit = AuditEntry::new(
            user_id,
            TransactionStatus::Failed,
            TransactionType::GracePeriodStart,
        );
        audit.failure_reason = reason.clone();
        audit.idempotency_key = idempotency_key;
        audit.metadata = json!({
            "grace_period_end": grace_period_end,
            "failed_payment_count": failed_payment_count,
            "reason": reason,
        });
        self.audit(audit).await;

        info!(
            %user_id,
            %grace_period_end,
            failed_payment_count,
            "grace_period: started"
        );
        Ok(GracePeriodOutcome::from_plan(
            format!("Grace period active for {GRACE_PERIOD_DAYS} days"),
            &updated,
        ))
    }

    pub async fn process_expired_grace_periods(&self) -> UseCaseResult<ExpiredGracePeriodsResult> {
        let now = self.clock.now();
        let expired = self
            .plan_repo
            .list_expired_grace_periods(now)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "grace_period: failed to list expired grace periods");
                GracePeriodError::Internal(err)
            })?;

        let mut result = ExpiredGracePeriodsResult {
            processed: expired.len(),
            ..Default::default()
        };

        for plan in expired {
            let changeset = UserPlanPaymentChangeset {
                payment_status: Some(PaymentStatus::Suspended.to_string()),
                grace_period_end: Some(None),
                updated_at: Some(now),
                ..Default::default()
            };

            match self
                .plan_repo
                .suspend_if_grace_expired(plan.user_id, now, changeset)
                .await
            {
                Ok(None) => {
                    result.skipped += 1;
                    info!(user_id = %plan.user_id, "grace_period: plan left grace period before suspension, skipped");
                }
                Ok(Some(_)) => {
                    result.suspended += 1;
                    let mut audit = AuditEntry::new(
                        plan.user_id,
                        TransactionStatus::Cancelled,
                        TransactionType::AccountSuspension,
                    );
                    audit.failure_reason = Some("grace period expired".to_string());
                    audit.metadata = json!({
                        "original_grace_period_end": plan.grace_period_end,
                        "failed_payment_count": plan.failed_payment_count,
                    });
                    self.audit(audit).await;
                    info!(user_id = %plan.user_id, "grace_period: account suspended");
                }
                Err(err) => {
                    error!(user_id = %plan.user_id, db_error = ?err, "grace_period: failed to suspend account");
                    result.errors.push(SweepRowError {
                        user_id: plan.user_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = result.processed,
            suspended = result.suspended,
            skipped = result.skipped,
            errors = result.errors.len(),
            "grace_period: expiry sweep finished"
        );
        Ok(result)
    }

    /// Returns the plan to active regardless of its current status.
    pub async fn restore_from_suspension(
        &self,
        user_id: Uuid,
        idempotency_key: Option<String>,
    ) -> UseCaseResult<GracePeriodOutcome> {
        info!(%user_id, "grace_period: restore requested");

        if let Some(plan) = self.replayed(user_id, idempotency_key.as_deref()).await? {
            return Ok(GracePeriodOutcome::from_plan("Request already processed", &plan));
        }

        let plan = self.load_plan(user_id).await?;
        let updated = self
            .restore(&plan, TransactionType::AccountRestoration, idempotency_key, None)
            .await?;

        Ok(GracePeriodOutcome::from_plan("Account restored", &updated))
    }

    pub async fn extend_grace_period(
        &self,
        user_id: Uuid,
        additional_days: i64,
    ) -> UseCaseResult<GracePeriodOutcome> {
        if !(1..=MAX_EXTENSION_DAYS).contains(&additional_days) {
            return Err(GracePeriodError::InvalidRequest(format!(
                "additional_days must be between 1 and {MAX_EXTENSION_DAYS}"
            )));
        }

        let plan = self.load_plan(user_id).await?;
        if !plan.plan_type().allows_grace_period() {
            warn!(%user_id, plan_type = %plan.plan_type, "grace_period: extension refused for plan");
            return Err(GracePeriodError::NotEligible(format!(
                "Grace period can only be extended on premium plans (current plan: {})",
                plan.plan_type
            )));
        }

        let now = self.clock.now();
        let base = plan.grace_period_end.unwrap_or(now);
        let grace_period_end = base + Duration::days(additional_days);

        let updated = self
            .apply(
                user_id,
                UserPlanPaymentChangeset {
                    payment_status: Some(PaymentStatus::GracePeriod.to_string()),
                    grace_period_end: Some(Some(grace_period_end)),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        let mut audit = AuditEntry::new(
            user_id,
            TransactionStatus::Pending,
            TransactionType::GracePeriodExtension,
        );
        audit.metadata = json!({
            "previous_grace_period_end": plan.grace_period_end,
            "grace_period_end": grace_period_end,
            "additional_days": additional_days,
        });
        self.audit(audit).await;

        info!(%user_id, additional_days, %grace_period_end, "grace_period: extended");
        Ok(GracePeriodOutcome::from_plan(
            format!("Grace period extended by {additional_days} days"),
            &updated,
        ))
    }

    pub async fn get_grace_period_status(&self, user_id: Uuid) -> UseCaseResult<GracePeriodStatus> {
        let plan = self.load_plan(user_id).await?;
        Ok(GracePeriodStatus::from_plan(&plan, self.clock.now()))
    }

    pub async fn grace_period_overview(&self) -> UseCaseResult<GracePeriodOverview> {
        let counts = self.plan_repo.count_by_payment_status().await.map_err(|err| {
            error!(db_error = ?err, "grace_period: failed to count plans by status");
            GracePeriodError::Internal(err)
        })?;
        let in_grace = self.plan_repo.list_in_grace_period().await.map_err(|err| {
            error!(db_error = ?err, "grace_period: failed to list plans in grace period");
            GracePeriodError::Internal(err)
        })?;

        let now = self.clock.now();
        Ok(GracePeriodOverview {
            status_counts: counts
                .into_iter()
                .map(|(payment_status, count)| PaymentStatusCount {
                    payment_status,
                    count,
                })
                .collect(),
            in_grace_period: in_grace
                .into_iter()
                .map(|plan| GracePeriodUser {
                    user_id: plan.user_id,
                    grace_period_end: plan.grace_period_end,
                    days_remaining: plan
                        .grace_period_end
                        .map(|end| days_remaining(end, now))
                        .unwrap_or(0),
                    failed_payment_count: plan.failed_payment_count,
                })
                .collect(),
        })
    }

    pub async fn cancel_subscription(
        &self,
        user_id: Uuid,
        idempotency_key: Option<String>,
    ) -> UseCaseResult<GracePeriodOutcome> {
        if let Some(plan) = self.replayed(user_id, idempotency_key.as_deref()).await? {
            return Ok(GracePeriodOutcome::from_plan("Request already processed", &plan));
        }

        let plan = self.load_plan(user_id).await?;
        let now = self.clock.now();
        let updated = self
            .apply(
                user_id,
                UserPlanPaymentChangeset {
                    payment_status: Some(PaymentStatus::Cancelled.to_string()),
                    grace_period_end: Some(None),
                    next_payment_date: Some(None),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        let mut audit = AuditEntry::new(
            user_id,
            TransactionStatus::Cancelled,
            TransactionType::SubscriptionCancellation,
        );
        audit.idempotency_key = idempotency_key;
        audit.metadata = json!({ "previous_payment_status": plan.payment_status });
        self.audit(audit).await;

        info!(%user_id, previous_status = %plan.payment_status, "grace_period: subscription cancelled");
        Ok(GracePeriodOutcome::from_plan("Subscription cancelled", &updated))
    }

    pub async fn record_payment_success(
        &self,
        user_id: Uuid,
        details: PaymentDetails,
        idempotency_key: Option<String>,
    ) -> UseCaseResult<GracePeriodOutcome> {
        if let Some(plan) = self.replayed(user_id, idempotency_key.as_deref()).await? {
            return Ok(GracePeriodOutcome::from_plan("Request already processed", &plan));
        }

        let plan = self.load_plan(user_id).await?;
        let (transaction_type, message) = match plan.payment_status() {
            Some(PaymentStatus::Active) => (TransactionType::Payment, "Payment recorded"),
            Some(PaymentStatus::Cancelled) => (
                TransactionType::SubscriptionReactivation,
                "Subscription reactivated",
            ),
            _ => (TransactionType::AccountRestoration, "Account restored"),
        };

        let updated = self
            .restore(&plan, transaction_type, idempotency_key, Some(details))
            .await?;

        Ok(GracePeriodOutcome::from_plan(message, &updated))
    }

    async fn restore(
        &self,
        plan: &UserPlanEntity,
        transaction_type: TransactionType,
        idempotency_key: Option<String>,
        details: Option<PaymentDetails>,
    ) -> UseCaseResult<UserPlanEntity> {
        let now = self.clock.now();
        let next_payment_date = now + Duration::days(BILLING_CYCLE_DAYS);

        let updated = self
            .apply(
                plan.user_id,
                UserPlanPaymentChangeset {
                    payment_status: Some(PaymentStatus::Active.to_string()),
                    failed_payment_count: Some(0),
                    grace_period_end: Some(None),
                    last_payment_date: Some(Some(now)),
                    next_payment_date: Some(Some(next_payment_date)),
                    updated_at: Some(now),
                },
            )
            .await?;

        let details = details.unwrap_or_default();
        let mut audit = AuditEntry::new(plan.user_id, TransactionStatus::Success, transaction_type);
        audit.amount_minor = details.amount_minor;
        audit.currency = details.currency;
        audit.processor_reference = details.processor_reference;
        audit.idempotency_key = idempotency_key;
        audit.metadata = json!({
            "previous_payment_status": plan.payment_status,
            "previous_failed_payment_count": plan.failed_payment_count,
            "next_payment_date": next_payment_date,
        });
        self.audit(audit).await;

        info!(
            user_id = %plan.user_id,
            previous_status = %plan.payment_status,
            transaction_type = %transaction_type,
            "grace_period: plan returned to active"
        );
        Ok(updated)
    }

    /// When the key was already used, returns the plan as it stands so callers can echo it.
    async fn replayed(
        &self,
        user_id: Uuid,
        idempotency_key: Option<&str>,
    ) -> UseCaseResult<Option<UserPlanEntity>> {
        let Some(key) = idempotency_key.filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let seen = self
            .transaction_repo
            .exists_by_idempotency_key(key)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "grace_period: failed to check idempotency key");
                GracePeriodError::Internal(err)
            })?;
        if !seen {
            return Ok(None);
        }

        info!(%user_id, idempotency_key = %key, "grace_period: duplicate request ignored");
        self.load_plan(user_id).await.map(Some)
    }

    async fn load_plan(&self, user_id: Uuid) -> UseCaseResult<UserPlanEntity> {
        self.plan_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "grace_period: failed to load plan");
                GracePeriodError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, "grace_period: plan not found");
                GracePeriodError::PlanNotFound(user_id)
            })
    }

    async fn apply(
        &self,
        user_id: Uuid,
        changeset: UserPlanPaymentChangeset,
    ) -> UseCaseResult<UserPlanEntity> {
        self.plan_repo
            .update_payment_state(user_id, changeset)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "grace_period: failed to update plan");
                GracePeriodError::Internal(err)
            })
    }

    /// Audit rows never fail the transition they describe.
    async fn audit(&self, entry: AuditEntry) {
        let user_id = entry.user_id;
        let transaction_type = entry.transaction_type;
        let row = InsertPaymentTransactionEntity {
            user_id: entry.user_id,
            amount_minor: entry.amount_minor,
            currency: entry.currency.unwrap_or_else(|| "usd".to_string()),
            status: entry.status.to_string(),
            transaction_type: entry.transaction_type.to_string(),
            payment_method: None,
            processor_reference: entry.processor_reference,
            failure_reason: entry.failure_reason,
            idempotency_key: entry.idempotency_key,
            metadata: entry.metadata,
        };

        if let Err(err) = self.transaction_repo.record(row).await {
            warn!(
                %user_id,
                %transaction_type,
                db_error = ?err,
                "grace_period: failed to write audit row"
            );
        }
    }
}

/// Last instant of a grace period started at `now`.
pub fn grace_period_end_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(GRACE_PERIOD_DAYS)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use crates::domain::repositories::{
        payment_transactions::MockPaymentTransactionRepository,
        user_plans::MockUserPlanRepository,
    };
    use mockall::predicate::{always, eq};

    use super::*;

    struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct InMemoryPlans {
        plans: Mutex<HashMap<Uuid, UserPlanEntity>>,
    }

    impl InMemoryPlans {
        fn with(plans: Vec<UserPlanEntity>) -> Arc<Self> {
            Arc::new(Self {
                plans: Mutex::new(plans.into_iter().map(|p| (p.user_id, p)).collect()),
            })
        }

        fn get(&self, user_id: Uuid) -> UserPlanEntity {
            self.plans.lock().unwrap()[&user_id].clone()
        }
    }

    #[async_trait]
    impl UserPlanRepository for InMemoryPlans {
        async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<UserPlanEntity>> {
            Ok(self.plans.lock().unwrap().get(&user_id).cloned())
        }

        async fn find_by_stripe_customer_id(&self, id: &str) -> Result<Option<UserPlanEntity>> {
            Ok(self
                .plans
                .lock()
                .unwrap()
                .values()
                .find(|p| p.stripe_customer_id.as_deref() == Some(id))
                .cloned())
        }

        async fn find_by_stripe_subscription_id(&self, id: &str) -> Result<Option<UserPlanEntity>> {
            Ok(self
                .plans
                .lock()
                .unwrap()
                .values()
                .find(|p| p.stripe_subscription_id.as_deref() == Some(id))
                .cloned())
        }

        async fn update_payment_state(
            &self,
            user_id: Uuid,
            changeset: UserPlanPaymentChangeset,
        ) -> Result<UserPlanEntity> {
            let mut plans = self.plans.lock().unwrap();
            let plan = plans
                .get_mut(&user_id)
                .ok_or_else(|| anyhow::anyhow!("no plan"))?;
            if let Some(status) = changeset.payment_status {
                plan.payment_status = status;
            }
            if let Some(count) = changeset.failed_payment_count {
                plan.failed_payment_count = count;
            }
            if let Some(end) = changeset.grace_period_end {
                plan.grace_period_end = end;
            }
            if let Some(last) = changeset.last_payment_date {
                plan.last_payment_date = last;
            }
            if let Some(next) = changeset.next_payment_date {
                plan.next_payment_date = next;
            }
            if let Some(updated_at) = changeset.updated_at {
                plan.updated_at = updated_at;
            }
            Ok(plan.clone())
        }

        async fn suspend_if_grace_expired(
            &self,
            user_id: Uuid,
            now: DateTime<Utc>,
            changeset: UserPlanPaymentChangeset,
        ) -> Result<Option<UserPlanEntity>> {
            let expired = self.plans.lock().unwrap().get(&user_id).is_some_and(|p| {
                p.payment_status == "grace_period" && p.grace_period_end.is_some_and(|end| end <= now)
            });
            if !expired {
                return Ok(None);
            }
            self.update_payment_state(user_id, changeset).await.map(Some)
        }

        async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> Result<Vec<UserPlanEntity>> {
            Ok(self
                .plans
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.payment_status == "grace_period")
                .filter(|p| p.grace_period_end.is_some_and(|end| end <= now))
                .cloned()
                .collect())
        }

        async fn list_in_grace_period(&self) -> Result<Vec<UserPlanEntity>> {
            Ok(self
                .plans
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.payment_status == "grace_period")
                .cloned()
                .collect())
        }

        async fn count_by_payment_status(&self) -> Result<Vec<(String, i64)>> {
            let mut counts: HashMap<String, i64> = HashMap::new();
            for plan in self.plans.lock().unwrap().values() {
                *counts.entry(plan.payment_status.clone()).or_default() += 1;
            }
            let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
            counts.sort();
            Ok(counts)
        }
    }

    #[derive(Default)]
    struct InMemoryTransactions {
        rows: Mutex<Vec<InsertPaymentTransactionEntity>>,
    }

    impl InMemoryTransactions {
        fn types_for(&self, user_id: Uuid) -> Vec<String> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| r.transaction_type.clone())
                .collect()
        }
    }

    #[async_trait]
    impl PaymentTransactionRepository for InMemoryTransactions {
        async fn record(&self, transaction: InsertPaymentTransactionEntity) -> Result<Uuid> {
            self.rows.lock().unwrap().push(transaction);
            Ok(Uuid::new_v4())
        }

        async fn exists_by_idempotency_key(&self, key: &str) -> Result<bool> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.idempotency_key.as_deref() == Some(key)))
        }
    }

    fn sample_plan(plan_type: &str, payment_status: &str, now: DateTime<Utc>) -> UserPlanEntity {
        UserPlanEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_type: plan_type.to_string(),
            payment_status: payment_status.to_string(),
            expires_at: None,
            failed_payment_count: 0,
            grace_period_end: None,
            last_payment_date: None,
            next_payment_date: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        plans: &Arc<InMemoryPlans>,
        transactions: &Arc<InMemoryTransactions>,
        clock: &Arc<FixedClock>,
    ) -> GracePeriodUseCase<InMemoryPlans, InMemoryTransactions> {
        GracePeriodUseCase::new(
            Arc::clone(plans),
            Arc::clone(transactions),
            Arc::clone(clock) as Arc<dyn Clock>,
        )
    }

    #[tokio::test]
    async fn premium_plan_enters_grace_period_for_seven_days() {
        let now = Utc::now();
        let plan = sample_plan("premium", "active", now);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);

        let outcome = usecase(&plans, &transactions, &clock)
            .start_grace_period(user_id, Some("card declined".to_string()), None)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.payment_status, "grace_period");
        assert_eq!(outcome.grace_period_end, Some(grace_period_end_from(now)));
        assert_eq!(outcome.failed_payment_count, 1);
        assert_eq!(transactions.types_for(user_id), ["grace_period_start"]);
        let row = transactions.rows.lock().unwrap()[0].clone();
        assert_eq!(row.status, "failed");
        assert_eq!(row.amount_minor, 0);
        assert_eq!(row.failure_reason.as_deref(), Some("card declined"));
    }

    #[tokio::test]
    async fn free_plan_is_rejected_without_mutation() {
        let now = Utc::now();
        let plan = sample_plan("free", "active", now);
        let user_id = plan.user_id;

        let mut plan_repo = MockUserPlanRepository::new();
        plan_repo
            .expect_find_by_user_id()
            .with(eq(user_id))
            .returning(move |_| {
                let plan = plan.clone();
                Box::pin(async move { Ok(Some(plan)) })
            });
        plan_repo.expect_update_payment_state().never();
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo.expect_record().never();

        let usecase = GracePeriodUseCase::new(
            Arc::new(plan_repo),
            Arc::new(transaction_repo),
            FixedClock::at(now) as Arc<dyn Clock>,
        );

        let err = usecase
            .start_grace_period(user_id, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, GracePeriodError::NotEligible(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_plan_is_not_found() {
        let mut plan_repo = MockUserPlanRepository::new();
        plan_repo
            .expect_find_by_user_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = GracePeriodUseCase::new(
            Arc::new(plan_repo),
            Arc::new(MockPaymentTransactionRepository::new()),
            FixedClock::at(Utc::now()) as Arc<dyn Clock>,
        );

        let err = usecase.get_grace_period_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GracePeriodError::PlanNotFound(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_returns_current_state() {
        let now = Utc::now();
        let plan = sample_plan("premium", "active", now);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);
        let usecase = usecase(&plans, &transactions, &clock);

        usecase
            .start_grace_period(user_id, None, Some("evt_1".to_string()))
            .await
            .unwrap();
        clock.advance(Duration::hours(1));
        let replay = usecase
            .start_grace_period(user_id, None, Some("evt_1".to_string()))
            .await
            .unwrap();

        assert_eq!(replay.failed_payment_count, 1);
        assert_eq!(replay.grace_period_end, Some(grace_period_end_from(now)));
        assert_eq!(transactions.types_for(user_id).len(), 1);
    }

    #[tokio::test]
    async fn sweep_suspends_only_expired_plans() {
        let now = Utc::now();
        let plans = InMemoryPlans::with(vec![
            sample_plan("premium", "active", now),
            sample_plan("premium", "active", now),
            sample_plan("premium", "active", now),
        ]);
        let ids: Vec<Uuid> = plans.plans.lock().unwrap().keys().copied().collect();
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);
        let usecase = usecase(&plans, &transactions, &clock);

        usecase.start_grace_period(ids[0], None, None).await.unwrap();
        usecase.start_grace_period(ids[1], None, None).await.unwrap();
        clock.advance(Duration::days(5));
        usecase.start_grace_period(ids[2], None, None).await.unwrap();

        clock.advance(Duration::days(3));
        let result = usecase.process_expired_grace_periods().await.unwrap();

        assert_eq!(result.processed, 2);
        assert_eq!(result.suspended, 2);
        assert!(result.errors.is_empty());
        for id in &ids[..2] {
            let plan = plans.get(*id);
            assert_eq!(plan.payment_status, "suspended");
            assert_eq!(plan.grace_period_end, None);
            assert!(transactions.types_for(*id).contains(&"account_suspension".to_string()));
        }
        assert_eq!(plans.get(ids[2]).payment_status, "grace_period");
    }

    #[tokio::test]
    async fn restarting_grace_period_resets_end_and_counts_failure() {
        let start = Utc::now();
        let plan = sample_plan("premium", "active", start);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(start);
        let usecase = usecase(&plans, &transactions, &clock);

        usecase
            .start_grace_period(user_id, None, Some("evt_a".to_string()))
            .await
            .unwrap();
        clock.advance(Duration::days(2));
        let outcome = usecase
            .start_grace_period(user_id, None, Some("evt_b".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.grace_period_end, Some(start + Duration::days(9)));
        assert_eq!(outcome.failed_payment_count, 2);
        assert_eq!(plans.get(user_id).grace_period_end, Some(start + Duration::days(9)));
        assert_eq!(transactions.types_for(user_id).len(), 2);
    }

    #[tokio::test]
    async fn sweep_skips_plan_that_left_grace_period_after_listing() {
        let now = Utc::now();
        let mut listed = sample_plan("premium", "grace_period", now);
        listed.grace_period_end = Some(now - Duration::hours(1));
        let user_id = listed.user_id;
        let mut current = listed.clone();
        current.payment_status = "active".to_string();
        current.grace_period_end = None;

        // The listing still sees the stale row while the stored plan was restored.
        let stored = Arc::new(Mutex::new(current));
        let mut plan_repo = MockUserPlanRepository::new();
        plan_repo
            .expect_list_expired_grace_periods()
            .returning(move |_| {
                let listed = listed.clone();
                Box::pin(async move { Ok(vec![listed]) })
            });
        let plan_state = Arc::clone(&stored);
        plan_repo
            .expect_suspend_if_grace_expired()
            .with(eq(user_id), eq(now), always())
            .times(1)
            .returning(move |_, now, _| {
                let plan = plan_state.lock().unwrap().clone();
                let expired = plan.payment_status == "grace_period"
                    && plan.grace_period_end.is_some_and(|end| end <= now);
                Box::pin(async move { Ok(expired.then_some(plan)) })
            });
        plan_repo.expect_update_payment_state().never();
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo.expect_record().never();

        let usecase = GracePeriodUseCase::new(
            Arc::new(plan_repo),
            Arc::new(transaction_repo),
            FixedClock::at(now) as Arc<dyn Clock>,
        );

        let result = usecase.process_expired_grace_periods().await.unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.suspended, 0);
        assert_eq!(result.skipped, 1);
        assert!(result.errors.is_empty());
        assert_eq!(stored.lock().unwrap().payment_status, "active");
    }

    #[tokio::test]
    async fn restore_clears_state_from_any_status() {
        let now = Utc::now();
        let mut suspended = sample_plan("premium", "suspended", now);
        suspended.failed_payment_count = 4;
        let mut grace = sample_plan("premium", "grace_period", now);
        grace.grace_period_end = Some(now + Duration::days(2));
        let free_active = sample_plan("free", "active", now);
        let ids = [suspended.user_id, grace.user_id, free_active.user_id];

        let plans = InMemoryPlans::with(vec![suspended, grace, free_active]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);
        let usecase = usecase(&plans, &transactions, &clock);

        for id in ids {
            usecase.restore_from_suspension(id, None).await.unwrap();
            let plan = plans.get(id);
            assert_eq!(plan.payment_status, "active");
            assert_eq!(plan.failed_payment_count, 0);
            assert_eq!(plan.grace_period_end, None);
            assert_eq!(plan.last_payment_date, Some(now));
            assert_eq!(plan.next_payment_date, Some(now + Duration::days(30)));
            assert_eq!(transactions.types_for(id), ["account_restoration"]);
        }
    }

    #[tokio::test]
    async fn extend_validates_days_and_adds_to_current_end() {
        let now = Utc::now();
        let mut plan = sample_plan("premium", "grace_period", now);
        let end = now + Duration::days(2);
        plan.grace_period_end = Some(end);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);
        let usecase = usecase(&plans, &transactions, &clock);

        for days in [0, 91, -3] {
            let err = usecase.extend_grace_period(user_id, days).await.unwrap_err();
            assert!(matches!(err, GracePeriodError::InvalidRequest(_)));
        }

        let outcome = usecase.extend_grace_period(user_id, 5).await.unwrap();

        assert_eq!(outcome.grace_period_end, Some(end + Duration::days(5)));
        assert_eq!(transactions.types_for(user_id), ["grace_period_extension"]);
    }

    #[tokio::test]
    async fn extend_is_refused_for_free_plan() {
        let now = Utc::now();
        let plan = sample_plan("free", "active", now);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);

        let err = usecase(&plans, &transactions, &clock)
            .extend_grace_period(user_id, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, GracePeriodError::NotEligible(_)));
        let plan = plans.get(user_id);
        assert_eq!(plan.payment_status, "active");
        assert_eq!(plan.grace_period_end, None);
        assert!(transactions.types_for(user_id).is_empty());
    }

    #[tokio::test]
    async fn payment_success_after_cancellation_reactivates() {
        let now = Utc::now();
        let plan = sample_plan("premium", "active", now);
        let user_id = plan.user_id;
        let plans = InMemoryPlans::with(vec![plan]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);
        let usecase = usecase(&plans, &transactions, &clock);

        usecase.cancel_subscription(user_id, None).await.unwrap();
        assert_eq!(plans.get(user_id).payment_status, "cancelled");

        let outcome = usecase
            .record_payment_success(
                user_id,
                PaymentDetails {
                    amount_minor: 2900,
                    currency: Some("usd".to_string()),
                    processor_reference: Some("in_1".to_string()),
                },
                Some("evt_paid".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.payment_status, "active");
        assert_eq!(
            transactions.types_for(user_id),
            ["subscription_cancellation", "subscription_reactivation"]
        );
    }

    #[tokio::test]
    async fn overview_counts_statuses_and_lists_grace_users() {
        let now = Utc::now();
        let mut grace = sample_plan("premium", "grace_period", now);
        grace.grace_period_end = Some(now + Duration::hours(30));
        let plans = InMemoryPlans::with(vec![
            grace,
            sample_plan("premium", "active", now),
            sample_plan("free", "active", now),
        ]);
        let transactions = Arc::new(InMemoryTransactions::default());
        let clock = FixedClock::at(now);

        let overview = usecase(&plans, &transactions, &clock)
            .grace_period_overview()
            .await
            .unwrap();

        assert_eq!(
            overview.status_counts,
            vec![
                PaymentStatusCount {
                    payment_status: "active".to_string(),
                    count: 2
                },
                PaymentStatusCount {
                    payment_status: "grace_period".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(overview.in_grace_period.len(), 1);
        assert_eq!(overview.in_grace_period[0].days_remaining, 2);
    }
}
