use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::domain::repositories::{
    payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
};

use crate::{axum_http::error_responses::AppError, usecases::payment_events::PaymentEventUseCase};

const STRIPE_SIGNATURE: &str = "stripe-signature";

pub fn routes<U, T>(usecase: Arc<PaymentEventUseCase<U, T>>) -> Router
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/stripe", post(stripe_webhook::<U, T>))
        .with_state(usecase)
}

/// The body is taken as raw bytes; the signature covers the exact payload Stripe sent.
pub async fn stripe_webhook<U, T>(
    State(usecase): State<Arc<PaymentEventUseCase<U, T>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Stripe-Signature header".to_string()))?;

    let outcome = usecase.handle_webhook(&body, signature).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use crates::{
        domain::{
            repositories::{
                payment_transactions::MockPaymentTransactionRepository,
                user_plans::MockUserPlanRepository,
            },
            value_objects::clock::{Clock, SystemClock},
        },
        payments::stripe_webhooks::StripeWebhookVerifier,
    };
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tower::ServiceExt;

    use super::*;
    use crate::usecases::grace_periods::GracePeriodUseCase;

    const SECRET: &str = "whsec_router";

    fn app() -> Router {
        let mut plan_repo = MockUserPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_customer_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        plan_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let plan_repo = Arc::new(plan_repo);
        let grace = GracePeriodUseCase::new(
            Arc::clone(&plan_repo),
            Arc::new(MockPaymentTransactionRepository::new()),
            Arc::clone(&clock),
        );
        let usecase = PaymentEventUseCase::new(
            plan_repo,
            Arc::new(grace),
            Some(StripeWebhookVerifier::new(SECRET.to_string())),
            clock,
        );
        routes(Arc::new(usecase))
    }

    fn sign(payload: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    const PAYLOAD: &str = r#"{"id":"evt_9","type":"invoice.payment_failed","data":{"object":{"object":"invoice","customer":"cus_9"}}}"#;

    #[tokio::test]
    async fn signed_event_is_acknowledged() {
        let response = app()
            .oneshot(
                Request::post("/stripe")
                    .header(STRIPE_SIGNATURE, sign(PAYLOAD))
                    .body(Body::from(PAYLOAD))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tampered_event_is_rejected() {
        let tampered = PAYLOAD.replace("cus_9", "cus_0");
        let response = app()
            .oneshot(
                Request::post("/stripe")
                    .header(STRIPE_SIGNATURE, sign(PAYLOAD))
                    .body(Body::from(tampered))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let response = app()
            .oneshot(Request::post("/stripe").body(Body::from(PAYLOAD)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
