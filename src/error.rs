// HTTP API error boundary
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::authenticator::AuthError;
use crate::auth::token::TokenError;
use crate::db::session::SessionError;

/// Request-level failures, mapped to fixed status codes and client-safe
/// messages. Internal detail stays in the variant for logs and never reaches
/// the response body.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown user or wrong password; deliberately indistinguishable.
    InvalidCredentials,
    /// Signature fine, `exp` in the past; clients should re-authenticate.
    TokenExpired,
    /// Bad signature, wrong algorithm, malformed payload, or a subject that
    /// no longer resolves to a user.
    TokenInvalid,
    /// Refresh endpoint called without its cookie.
    MissingRefreshToken,
    /// Tenant schema missing, pool exhausted, or the database unreachable.
    SchemaRouting(String),
    InternalServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::TokenInvalid => StatusCode::UNAUTHORIZED,
            ApiError::MissingRefreshToken => StatusCode::BAD_REQUEST,
            ApiError::SchemaRouting(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message.
    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidCredentials => "Incorrect username or password",
            ApiError::TokenExpired => "Token expired",
            ApiError::TokenInvalid => "Could not validate credentials",
            ApiError::MissingRefreshToken => "Missing refresh token",
            ApiError::SchemaRouting(_) => "Database temporarily unavailable",
            ApiError::InternalServerError(_) => {
                "An error occurred while processing your request"
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::TokenInvalid => "TOKEN_INVALID",
            ApiError::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            ApiError::SchemaRouting(_) => "SERVICE_UNAVAILABLE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code(),
        })
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::InternalServerError(detail.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownUser | AuthError::InactiveUser | AuthError::WrongPassword => {
                // Which factor failed is logged here and nowhere else.
                tracing::debug!("login rejected: {err}");
                ApiError::InvalidCredentials
            }
            AuthError::Db(e) => {
                tracing::error!("database error during authentication: {e}");
                ApiError::internal(e.to_string())
            }
            AuthError::Password(e) => {
                tracing::error!("password verification error: {e}");
                ApiError::internal(e.to_string())
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Invalid => ApiError::TokenInvalid,
            TokenError::UnsupportedAlgorithm(_) | TokenError::Signing(_) => {
                tracing::error!("token service error: {err}");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        // Full context (including schema names) goes to the log only.
        tracing::error!("schema routing failure: {err}");
        ApiError::SchemaRouting(err.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {err}");
        ApiError::internal(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
