use std::ops::{Deref, DerefMut};
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Errors from session acquisition and schema routing.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid schema name: {0}")]
    InvalidSchemaName(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Hands out database sessions scoped to a single schema.
///
/// One bounded pool backs every schema; the routing happens per session via
/// `search_path`, so the shared table definitions work unqualified against
/// whichever schema the session was opened for. A session holds its pooled
/// connection exclusively for its whole lifetime, which is what keeps two
/// concurrent sessions for different tenants from ever interleaving queries
/// on one translated connection.
pub struct SessionFactory {
    pool: PgPool,
    shared_schema: String,
}

impl SessionFactory {
    /// Build the factory with a lazily-connecting pool sized
    /// `pool_size + pool_overflow`, so checkout blocks (up to the acquire
    /// timeout) instead of opening unbounded connections.
    pub fn new(config: &DatabaseConfig) -> Result<Self, SessionError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool_size)
            .max_connections(config.pool_size + config.pool_overflow)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;

        Ok(Self {
            pool,
            shared_schema: config.shared_schema.clone(),
        })
    }

    pub fn shared_schema(&self) -> &str {
        &self.shared_schema
    }

    /// Open a session whose unqualified table references resolve in
    /// `schema`, as one transaction on a dedicated pooled connection.
    ///
    /// `SET LOCAL` expires with the transaction, so the connection returns
    /// to the pool without a lingering search_path.
    pub async fn open_session(&self, schema: &str) -> Result<ScopedSession, SessionError> {
        if !is_valid_schema_name(schema) {
            return Err(SessionError::InvalidSchemaName(schema.to_string()));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "SET LOCAL search_path TO {}",
            quote_identifier(schema)
        ))
        .execute(&mut *tx)
        .await?;

        Ok(ScopedSession { tx })
    }

    /// Session against the shared schema holding the tenant/user directory.
    pub async fn open_shared_session(&self) -> Result<ScopedSession, SessionError> {
        self.open_session(&self.shared_schema).await
    }

    /// Scoped acquisition: run `work` inside a session for `schema`, commit
    /// when it returns `Ok`, roll back and propagate when it returns `Err`.
    /// The connection goes back to the pool on every exit path.
    pub async fn with_session<T, E, F>(&self, schema: &str, work: F) -> Result<T, E>
    where
        E: From<SessionError>,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
    {
        let session = self.open_session(schema).await.map_err(E::from)?;
        Self::run_scoped(session, work).await
    }

    /// [`with_session`](Self::with_session) against the shared schema; the
    /// scope used around the authentication phase of a request.
    pub async fn with_shared<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<SessionError>,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
    {
        let session = self.open_shared_session().await.map_err(E::from)?;
        Self::run_scoped(session, work).await
    }

    async fn run_scoped<T, E, F>(mut session: ScopedSession, work: F) -> Result<T, E>
    where
        E: From<SessionError>,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
    {
        match work(&mut session).await {
            Ok(value) => {
                session.commit().await.map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!("rollback failed after session error: {rollback_err}");
                }
                Err(err)
            }
        }
    }
}

/// A database session pinned to one schema for one unit of work.
///
/// Derefs to [`PgConnection`], so repositories take `&mut PgConnection` and
/// stay unaware of routing. Dropping the session without committing rolls
/// the transaction back and releases the connection.
pub struct ScopedSession {
    tx: Transaction<'static, Postgres>,
}

impl ScopedSession {
    pub async fn commit(self) -> Result<(), SessionError> {
        self.tx.commit().await.map_err(SessionError::from)
    }

    pub async fn rollback(self) -> Result<(), SessionError> {
        self.tx.rollback().await.map_err(SessionError::from)
    }
}

impl Deref for ScopedSession {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

/// Schema names come from the tenant directory, never from clients, but the
/// identifier still has to be safe to splice into `SET LOCAL search_path`.
fn is_valid_schema_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
