use chrono::Utc;
use sqlx::{FromRow, PgConnection};

use super::audit::{self, AuditRecord};

/// A user directory row in the shared schema. `password` is a bcrypt hash;
/// plaintext never reaches storage. A user belongs to exactly one tenant for
/// its lifetime.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(flatten)]
    pub record: AuditRecord,
    pub tenant_id: i64,
    pub name: String,
    pub password: String,
    pub email: String,
    pub active: bool,
}

const COLUMNS: &str = "id, created_at, deleted_at, tenant_id, name, password, email, active";

pub async fn find_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM \"user\" WHERE name = $1 AND deleted_at IS NULL"
    ))
    .bind(name)
    .fetch_optional(conn)
    .await
}

pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM \"user\" WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Active, non-deleted users of one tenant. Explicit query in place of a
/// lazy collection on the tenant.
pub async fn list_active(
    conn: &mut PgConnection,
    tenant_id: i64,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM \"user\" \
         WHERE tenant_id = $1 AND deleted_at IS NULL AND active \
         ORDER BY id"
    ))
    .bind(tenant_id)
    .fetch_all(conn)
    .await
}

pub async fn insert(
    conn: &mut PgConnection,
    tenant_id: i64,
    name: &str,
    password_hash: &str,
    email: &str,
    active: bool,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO \"user\" (tenant_id, name, password, email, active) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(name)
    .bind(password_hash)
    .bind(email)
    .bind(active)
    .fetch_one(conn)
    .await
}

/// Stamp the tombstone and persist it. The `deleted_at IS NULL` guard keeps
/// the database's first timestamp on repeat calls.
pub async fn soft_delete(conn: &mut PgConnection, user: &mut User) -> Result<(), sqlx::Error> {
    audit::mark_deleted(&mut user.record, Utc::now());
    sqlx::query("UPDATE \"user\" SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
        .bind(user.record.deleted_at)
        .bind(user.record.id)
        .execute(conn)
        .await?;
    Ok(())
}
