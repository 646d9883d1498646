use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::{FromRow, PgConnection};

use crate::db::session::{SessionError, SessionFactory};

/// The authenticated caller, resolved to its owning tenant's schema. This is
/// the only path from an authenticated identity to a tenant scope; nothing
/// downstream accepts a tenant from request input.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CurrentUser {
    pub username: String,
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub tenant_schema: String,
}

/// Look up a user id in the shared schema and follow the ownership relation
/// to its tenant. Both sides must be non-deleted.
pub async fn resolve(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<CurrentUser>, sqlx::Error> {
    sqlx::query_as::<_, CurrentUser>(
        "SELECT u.name AS username, \
                u.id AS user_id, \
                u.email AS email, \
                u.name AS full_name, \
                t.schema AS tenant_schema \
         FROM \"user\" u \
         JOIN tenant t ON t.id = u.tenant_id \
         WHERE u.id = $1 \
           AND u.deleted_at IS NULL \
           AND t.deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Run `work` once per tenant schema, each in its own scoped session,
/// committing between schemas. An error stops the iteration; the failing
/// schema's session rolls back on drop.
pub async fn for_each_tenant_schema<F>(
    factory: &SessionFactory,
    schemas: &[String],
    mut work: F,
) -> Result<(), SessionError>
where
    F: for<'c> FnMut(&'c str, &'c mut PgConnection) -> BoxFuture<'c, Result<(), SessionError>>,
{
    for schema in schemas {
        let mut session = factory.open_session(schema).await?;
        work(schema, &mut session).await?;
        session.commit().await?;
    }

    Ok(())
}
