use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use backend::usecases::grace_periods::GracePeriodUseCase;
use crates::domain::repositories::{
    payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
};
use tracing::error;

use super::require_trigger_token;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/grace-period/process-expired" \
//     -H "Authorization: Bearer $INTERNAL_TRIGGER_TOKEN"

pub struct GraceSweepRouteState<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    trigger_token: Option<Arc<str>>,
    usecase: Arc<GracePeriodUseCase<U, T>>,
}

impl<U, T> Clone for GraceSweepRouteState<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            trigger_token: self.trigger_token.clone(),
            usecase: Arc::clone(&self.usecase),
        }
    }
}

pub fn routes<U, T>(trigger_token: Option<String>, usecase: Arc<GracePeriodUseCase<U, T>>) -> Router
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/process-expired", post(process_expired::<U, T>))
        .with_state(GraceSweepRouteState {
            trigger_token: trigger_token.map(Arc::from),
            usecase,
        })
}

pub async fn process_expired<U, T>(
    State(state): State<GraceSweepRouteState<U, T>>,
    headers: HeaderMap,
) -> Response
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    if let Err(response) = require_trigger_token(state.trigger_token.as_deref(), &headers) {
        return response;
    }

    match state.usecase.process_expired_grace_periods().await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            error!(error = ?err, "grace_period route: sweep failed");
            (err.status_code(), err.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crates::domain::{
        repositories::{
            payment_transactions::MockPaymentTransactionRepository,
            user_plans::MockUserPlanRepository,
        },
        value_objects::clock::SystemClock,
    };
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let mut plans = MockUserPlanRepository::new();
        plans
            .expect_list_expired_grace_periods()
            .returning(|_| Box::pin(async { Ok(vec![]) }));

        let usecase = GracePeriodUseCase::new(
            Arc::new(plans),
            Arc::new(MockPaymentTransactionRepository::new()),
            Arc::new(SystemClock),
        );
        routes(Some("s3cret".to_string()), Arc::new(usecase))
    }

    #[tokio::test]
    async fn sweep_runs_with_valid_token() {
        let response = app()
            .oneshot(
                Request::post("/process-expired")
                    .header("authorization", "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sweep_requires_token() {
        let response = app()
            .oneshot(Request::post("/process-expired").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
