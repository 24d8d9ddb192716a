use std::sync::Arc;

use crates::{
    domain::{
        entities::user_plans::UserPlanEntity,
        repositories::{
            payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
        },
        value_objects::{clock::Clock, grace_periods::GracePeriodOutcome},
    },
    payments::stripe_webhooks::{
        BillingObjectRefs, CUSTOMER_SUBSCRIPTION_DELETED, INVOICE_PAYMENT_FAILED,
        INVOICE_PAYMENT_SUCCEEDED, StripeEvent, StripeWebhookVerifier,
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::grace_periods::{GracePeriodError, GracePeriodUseCase, PaymentDetails};

#[derive(Debug, Error)]
pub enum PaymentEventError {
    #[error("stripe webhooks are not configured")]
    NotConfigured,
    #[error("invalid webhook: {0}")]
    InvalidSignature(String),
    #[error(transparent)]
    GracePeriod(#[from] GracePeriodError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentEventError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentEventError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            PaymentEventError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            PaymentEventError::GracePeriod(err) => err.status_code(),
            PaymentEventError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEventOutcome {
    pub event_id: String,
    pub event_type: String,
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<GracePeriodOutcome>,
}

impl PaymentEventOutcome {
    fn ignored(event: &StripeEvent, detail: impl Into<String>) -> Self {
        Self {
            event_id: event.id.clone(),
            event_type: event.type_.clone(),
            handled: false,
            detail: Some(detail.into()),
            plan: None,
        }
    }

    fn handled(event: &StripeEvent, plan: GracePeriodOutcome) -> Self {
        Self {
            event_id: event.id.clone(),
            event_type: event.type_.clone(),
            handled: true,
            detail: None,
            plan: Some(plan),
        }
    }
}

/// Turns verified Stripe events into grace-period transitions. The event id doubles as
/// the idempotency key so redelivered events do not apply twice.
pub struct PaymentEventUseCase<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    plan_repo: Arc<U>,
    grace_periods: Arc<GracePeriodUseCase<U, T>>,
    verifier: Option<StripeWebhookVerifier>,
    clock: Arc<dyn Clock>,
}

impl<U, T> PaymentEventUseCase<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<U>,
        grace_periods: Arc<GracePeriodUseCase<U, T>>,
        verifier: Option<StripeWebhookVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plan_repo,
            grace_periods,
            verifier,
            clock,
        }
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEventOutcome, PaymentEventError> {
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            error!("payment_events: webhook received but STRIPE_WEBHOOK_SECRET is not set");
            PaymentEventError::NotConfigured
        })?;

        let event = verifier
            .verify(payload, signature_header, self.clock.now().timestamp())
            .map_err(|err| {
                warn!(error = %err, "payment_events: rejected webhook");
                PaymentEventError::InvalidSignature(err.to_string())
            })?;

        self.handle_event(event).await
    }

    pub async fn handle_event(
        &self,
        event: StripeEvent,
    ) -> Result<PaymentEventOutcome, PaymentEventError> {
        info!(event_id = %event.id, event_type = %event.type_, "payment_events: event received");

        let tracked = [
            INVOICE_PAYMENT_FAILED,
            INVOICE_PAYMENT_SUCCEEDED,
            CUSTOMER_SUBSCRIPTION_DELETED,
        ];
        if !tracked.contains(&event.type_.as_str()) {
            return Ok(PaymentEventOutcome::ignored(&event, "event type not handled"));
        }

        let refs = event.billing_refs();
        let Some(plan) = self.resolve_plan(&refs).await? else {
            warn!(
                event_id = %event.id,
                customer_id = ?refs.customer_id,
                subscription_id = ?refs.subscription_id,
                "payment_events: no plan matches event"
            );
            return Ok(PaymentEventOutcome::ignored(&event, "no matching plan"));
        };

        let user_id = plan.user_id;
        let key = Some(event.id.clone());
        let result = match event.type_.as_str() {
            INVOICE_PAYMENT_FAILED => {
                let reason = refs
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "invoice payment failed".to_string());
                self.grace_periods
                    .start_grace_period(user_id, Some(reason), key)
                    .await
            }
            INVOICE_PAYMENT_SUCCEEDED => {
                let details = PaymentDetails {
                    amount_minor: refs.amount_minor,
                    currency: refs.currency.clone(),
                    processor_reference: refs.object_id.clone(),
                };
                self.grace_periods
                    .record_payment_success(user_id, details, key)
                    .await
            }
            _ => self.grace_periods.cancel_subscription(user_id, key).await,
        };

        match result {
            Ok(outcome) => Ok(PaymentEventOutcome::handled(&event, outcome)),
            // Stripe retries non-2xx responses; an ineligible plan will never become eligible.
            Err(GracePeriodError::NotEligible(message)) => {
                info!(%user_id, event_id = %event.id, "payment_events: plan not eligible, event acknowledged");
                Ok(PaymentEventOutcome::ignored(&event, message))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn resolve_plan(
        &self,
        refs: &BillingObjectRefs,
    ) -> Result<Option<UserPlanEntity>, PaymentEventError> {
        if let Some(customer_id) = refs.customer_id.as_deref() {
            let plan = self
                .plan_repo
                .find_by_stripe_customer_id(customer_id)
                .await
                .map_err(|err| {
                    error!(%customer_id, db_error = ?err, "payment_events: customer lookup failed");
                    PaymentEventError::Internal(err)
                })?;
            if plan.is_some() {
                return Ok(plan);
            }
        }

        match refs.subscription_id.as_deref() {
            Some(subscription_id) => self
                .plan_repo
                .find_by_stripe_subscription_id(subscription_id)
                .await
                .map_err(|err| {
                    error!(%subscription_id, db_error = ?err, "payment_events: subscription lookup failed");
                    PaymentEventError::Internal(err)
                }),
            None => Ok(None),
        }
    }
}
