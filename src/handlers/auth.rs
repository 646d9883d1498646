use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::authenticator;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::tenancy::{self, CurrentUser};

pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
}

fn default_auto_refresh() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub access_token: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            token_type: "bearer",
            access_token,
        }
    }
}

/// POST /authentication/token
///
/// Verifies credentials against the shared schema and returns a bearer
/// access token. With `auto_refresh` (the default) a refresh token is set as
/// an HttpOnly cookie; it never appears in the body.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let LoginForm {
        username,
        password,
        auto_refresh,
    } = form;

    let user = state
        .sessions
        .with_shared(move |conn| {
            Box::pin(async move {
                authenticator::authenticate(conn, &username, &password)
                    .await
                    .map_err(ApiError::from)
            })
        })
        .await?;

    let access_token = state.tokens.issue_access(user.record.id)?;
    let mut response = Json(TokenResponse::bearer(access_token)).into_response();

    if auto_refresh {
        let refresh_token = state.tokens.issue_refresh(user.record.id)?;
        let cookie = refresh_cookie(&refresh_token, state.tokens.refresh_ttl());
        response.headers_mut().append(
            header::SET_COOKIE,
            cookie
                .parse()
                .map_err(|_| ApiError::internal("refresh cookie not header-safe"))?,
        );
    }

    Ok(response)
}

/// POST /authentication/refresh
///
/// Mints a new access token for the subject of a valid refresh cookie.
/// Refresh tokens are not rotated here; an accepted tradeoff, not an
/// oversight.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let refresh_token = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, REFRESH_COOKIE))
        .ok_or(ApiError::MissingRefreshToken)?;

    let user_id = state.tokens.validate(&refresh_token)?;
    let access_token = state.tokens.issue_access(user_id)?;

    Ok(Json(TokenResponse::bearer(access_token)))
}

/// GET /authentication/users/me
///
/// Resolves the bearer's identity to its tenant schema. A token whose
/// subject no longer exists behaves exactly like an invalid token.
pub async fn who_am_i(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<CurrentUser>, ApiError> {
    let user_id = auth.user_id;
    let current = state
        .sessions
        .with_shared(move |conn| {
            Box::pin(async move {
                tenancy::resolve(conn, user_id)
                    .await
                    .map_err(ApiError::from)
            })
        })
        .await?;

    current.map(Json).ok_or(ApiError::TokenInvalid)
}

/// GET /authentication/ping
///
/// Token liveness probe; the bearer guard has already validated the token by
/// the time this runs.
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

fn refresh_cookie(token: &str, max_age: chrono::Duration) -> String {
    format!(
        "{REFRESH_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        max_age.num_seconds()
    )
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_attributes() {
        let cookie = refresh_cookie("abc.def.ghi", chrono::Duration::minutes(2));

        assert!(cookie.starts_with("refresh_token=abc.def.ghi;"));
        assert!(cookie.contains("Max-Age=120"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn finds_cookie_among_others() {
        let header = "theme=dark; refresh_token=tok123; lang=en";
        assert_eq!(cookie_value(header, REFRESH_COOKIE).unwrap(), "tok123");
    }

    #[test]
    fn missing_cookie_is_none() {
        assert_eq!(cookie_value("theme=dark; lang=en", REFRESH_COOKIE), None);
        assert_eq!(cookie_value("", REFRESH_COOKIE), None);
    }

    #[test]
    fn login_form_defaults_auto_refresh_on() {
        let form: LoginForm =
            serde_urlencoded::from_str("username=admin&password=pw1").unwrap();
        assert!(form.auto_refresh);

        let form: LoginForm =
            serde_urlencoded::from_str("username=admin&password=pw1&auto_refresh=false").unwrap();
        assert!(!form.auto_refresh);
    }
}
