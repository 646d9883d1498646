use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::auth::token::TokenService;
use crate::config::AppConfig;
use crate::db::session::SessionFactory;
use crate::handlers;
use crate::middleware::auth::bearer_auth;

/// Shared request context: configuration plus the two long-lived services.
/// Everything here is read-only after startup; the pool inside the session
/// factory is the only shared resource.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<SessionFactory>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&config.security)?;
        let sessions = SessionFactory::new(&config.database)?;

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            sessions: Arc::new(sessions),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/authentication/token", post(handlers::auth::login))
        .route("/authentication/refresh", post(handlers::auth::refresh))
        .route("/health-check", get(handlers::health::health_check));

    let protected = Router::new()
        .route("/authentication/users/me", get(handlers::auth::who_am_i))
        .route("/authentication/ping", get(handlers::auth::ping))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            bearer_auth,
        ));

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
