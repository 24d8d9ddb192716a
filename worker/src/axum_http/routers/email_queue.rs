use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::error;

use super::require_trigger_token;
use crate::usecases::email_queue::EmailQueueWorker;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/email-queue/process" \
//     -H "Authorization: Bearer $INTERNAL_TRIGGER_TOKEN"

#[derive(Clone)]
pub struct EmailQueueRouteState {
    trigger_token: Option<Arc<str>>,
    worker: Arc<EmailQueueWorker>,
}

pub fn routes(trigger_token: Option<String>, worker: Arc<EmailQueueWorker>) -> Router {
    Router::new()
        .route("/process", post(process_queue))
        .route("/metrics", get(metrics))
        .with_state(EmailQueueRouteState {
            trigger_token: trigger_token.map(Arc::from),
            worker,
        })
}

pub async fn process_queue(State(state): State<EmailQueueRouteState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_trigger_token(state.trigger_token.as_deref(), &headers) {
        return response;
    }

    match state.worker.process_queued_jobs().await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => {
            error!(error = ?err, "email_queue route: cycle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "queue processing failed").into_response()
        }
    }
}

pub async fn metrics(State(state): State<EmailQueueRouteState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_trigger_token(state.trigger_token.as_deref(), &headers) {
        return response;
    }

    Json(state.worker.metrics()).into_response()
}
