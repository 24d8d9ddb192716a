use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::repositories::{
    payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthState, AuthUser},
    axum_http::error_responses::AppError,
    usecases::grace_periods::GracePeriodUseCase,
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/grace-period/extend/$USER_ID" \
//     -H "Authorization: Bearer $ADMIN_JWT" \
//     -H "Content-Type: application/json" \
//     -d '{"additional_days":3}'

pub struct GracePeriodRouteState<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    pub usecase: Arc<GracePeriodUseCase<U, T>>,
    pub auth: AuthState,
}

impl<U, T> Clone for GracePeriodRouteState<U, T>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            auth: self.auth.clone(),
        }
    }
}

impl<U, T> FromRef<GracePeriodRouteState<U, T>> for AuthState
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    fn from_ref(state: &GracePeriodRouteState<U, T>) -> Self {
        state.auth.clone()
    }
}

/// Admin operations, nested under `/api/v1/grace-period`.
pub fn routes<U, T>(usecase: Arc<GracePeriodUseCase<U, T>>, auth: AuthState) -> Router
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/start/:user_id", post(start_grace_period::<U, T>))
        .route("/process-expired", post(process_expired::<U, T>))
        .route("/restore/:user_id", post(restore_from_suspension::<U, T>))
        .route("/extend/:user_id", post(extend_grace_period::<U, T>))
        .route("/status/:user_id", get(grace_period_status::<U, T>))
        .route("/overview", get(grace_period_overview::<U, T>))
        .with_state(GracePeriodRouteState { usecase, auth })
}

/// The caller's own status, nested under `/api/v1/plan`.
pub fn plan_routes<U, T>(usecase: Arc<GracePeriodUseCase<U, T>>, auth: AuthState) -> Router
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/grace-period", get(my_grace_period_status::<U, T>))
        .with_state(GracePeriodRouteState { usecase, auth })
}

#[derive(Debug, Default, Deserialize)]
pub struct StartGracePeriodRequest {
    pub reason: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreRequest {
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendGracePeriodRequest {
    pub additional_days: i64,
}

pub async fn start_grace_period<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    payload: Option<Json<StartGracePeriodRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    info!(admin_id = %admin.user_id, %user_id, "grace_period router: start");

    let outcome = state
        .usecase
        .start_grace_period(user_id, request.reason, request.idempotency_key)
        .await?;
    Ok(Json(outcome))
}

pub async fn process_expired<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    info!(admin_id = %admin.user_id, "grace_period router: process expired");
    let result = state.usecase.process_expired_grace_periods().await?;
    Ok(Json(result))
}

pub async fn restore_from_suspension<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    payload: Option<Json<RestoreRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    info!(admin_id = %admin.user_id, %user_id, "grace_period router: restore");

    let outcome = state
        .usecase
        .restore_from_suspension(user_id, request.idempotency_key)
        .await?;
    Ok(Json(outcome))
}

pub async fn extend_grace_period<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ExtendGracePeriodRequest>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    info!(
        admin_id = %admin.user_id,
        %user_id,
        additional_days = request.additional_days,
        "grace_period router: extend"
    );

    let outcome = state
        .usecase
        .extend_grace_period(user_id, request.additional_days)
        .await?;
    Ok(Json(outcome))
}

pub async fn grace_period_status<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let status = state.usecase.get_grace_period_status(user_id).await?;
    Ok(Json(status))
}

pub async fn grace_period_overview<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let overview = state.usecase.grace_period_overview().await?;
    Ok(Json(overview))
}

pub async fn my_grace_period_status<U, T>(
    State(state): State<GracePeriodRouteState<U, T>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let status = state.usecase.get_grace_period_status(auth.user_id).await?;
    Ok(Json(status))
}
