use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{
    email_scheduling::EmailSchedulingError, grace_periods::GracePeriodError,
    payment_events::PaymentEventError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{1}")]
    Status(StatusCode, String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Status(status, _) => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::BadRequest(msg) | AppError::Status(_, msg) => msg,
            // Don't leak internal error detail to client
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

/// Use-case errors keep their own status; 5xx bodies are replaced by a generic message.
impl From<GracePeriodError> for AppError {
    fn from(err: GracePeriodError) -> Self {
        let status = err.status_code();
        match err {
            GracePeriodError::Internal(inner) => AppError::Internal(inner),
            other => AppError::Status(status, other.to_string()),
        }
    }
}

impl From<PaymentEventError> for AppError {
    fn from(err: PaymentEventError) -> Self {
        let status = err.status_code();
        match err {
            PaymentEventError::GracePeriod(inner) => inner.into(),
            PaymentEventError::Internal(inner) => AppError::Internal(inner),
            other => AppError::Status(status, other.to_string()),
        }
    }
}

impl From<EmailSchedulingError> for AppError {
    fn from(err: EmailSchedulingError) -> Self {
        let status = err.status_code();
        match err {
            EmailSchedulingError::Internal(inner) => AppError::Internal(inner),
            other => AppError::Status(status, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use uuid::Uuid;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn usecase_errors_keep_status_and_message() {
        let user_id = Uuid::new_v4();
        let (status, body) = body_json(GracePeriodError::PlanNotFound(user_id).into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], format!("no plan found for user {user_id}"));
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let err: AppError =
            GracePeriodError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3")).into();
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
