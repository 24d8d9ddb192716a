use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::{
    repositories::{email_jobs::EmailJobRepository, profiles::ProfileRepository},
    value_objects::email_jobs::EmailJobSpec,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{AdminUser, AuthState},
    axum_http::error_responses::AppError,
    usecases::email_scheduling::EmailSchedulingUseCase,
};

pub struct EmailQueueRouteState<J, P>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub usecase: Arc<EmailSchedulingUseCase<J, P>>,
    pub auth: AuthState,
}

impl<J, P> Clone for EmailQueueRouteState<J, P>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            auth: self.auth.clone(),
        }
    }
}

impl<J, P> FromRef<EmailQueueRouteState<J, P>> for AuthState
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    fn from_ref(state: &EmailQueueRouteState<J, P>) -> Self {
        state.auth.clone()
    }
}

pub fn routes<J, P>(usecase: Arc<EmailSchedulingUseCase<J, P>>, auth: AuthState) -> Router
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/stats", get(queue_stats::<J, P>))
        .route("/jobs", post(enqueue_jobs::<J, P>))
        .route("/daily-digests", post(schedule_daily_digests::<J, P>))
        .with_state(EmailQueueRouteState { usecase, auth })
}

#[derive(Debug, Deserialize)]
pub struct EnqueueJobsRequest {
    pub jobs: Vec<EmailJobSpec>,
}

pub async fn queue_stats<J, P>(
    State(state): State<EmailQueueRouteState<J, P>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    let stats = state.usecase.queue_stats().await?;
    Ok(Json(stats))
}

pub async fn enqueue_jobs<J, P>(
    State(state): State<EmailQueueRouteState<J, P>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<EnqueueJobsRequest>,
) -> Result<impl IntoResponse, AppError>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    info!(
        admin_id = %admin.user_id,
        requested = request.jobs.len(),
        "email_queue router: enqueue"
    );
    let summary = state.usecase.enqueue_batch(request.jobs).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn schedule_daily_digests<J, P>(
    State(state): State<EmailQueueRouteState<J, P>>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, AppError>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    info!(admin_id = %admin.user_id, "email_queue router: schedule daily digests");
    let summary = state.usecase.schedule_daily_digests().await?;
    Ok(Json(summary))
}
