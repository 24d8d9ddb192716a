pub mod email_queue;
pub mod grace_periods;

use axum::{
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};

/// Gate for the internal trigger routes. A worker started without a token refuses
/// every call with 503.
pub(crate) fn require_trigger_token(
    expected_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), Response> {
    let Some(expected_token) = expected_token else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "internal trigger token is not configured",
        )
            .into_response());
    };

    authorize_bearer(headers, expected_token).map_err(|status| (status, "unauthorized").into_response())
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
