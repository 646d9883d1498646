use axum::http::StatusCode;

/// GET /health-check
///
/// Process liveness only; touches neither the database nor the token
/// service.
pub async fn health_check() -> StatusCode {
    StatusCode::NO_CONTENT
}
