use chrono::Utc;
use sqlx::{FromRow, PgConnection};

use super::audit::{self, AuditRecord};

/// A tenant directory row in the shared schema. `schema` names the physical
/// schema holding the tenant's business tables.
#[derive(Debug, Clone, FromRow)]
pub struct Tenant {
    #[sqlx(flatten)]
    pub record: AuditRecord,
    pub name: String,
    pub schema: String,
    pub default_tenant: bool,
    pub active: bool,
}

const COLUMNS: &str = "id, created_at, deleted_at, name, schema, default_tenant, active";

pub async fn find_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {COLUMNS} FROM tenant WHERE name = $1 AND deleted_at IS NULL"
    ))
    .bind(name)
    .fetch_optional(conn)
    .await
}

/// Active, non-deleted tenants in id order.
pub async fn list_active(conn: &mut PgConnection) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {COLUMNS} FROM tenant WHERE deleted_at IS NULL AND active ORDER BY id"
    ))
    .fetch_all(conn)
    .await
}

/// Schema names of every non-deleted tenant, for per-schema administrative
/// iteration.
pub async fn schema_names(conn: &mut PgConnection) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT schema FROM tenant WHERE deleted_at IS NULL ORDER BY id")
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|(schema,)| schema).collect())
}

pub async fn insert(
    conn: &mut PgConnection,
    name: &str,
    schema: &str,
    active: bool,
    default_tenant: bool,
) -> Result<Tenant, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "INSERT INTO tenant (name, schema, active, default_tenant) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {COLUMNS}"
    ))
    .bind(name)
    .bind(schema)
    .bind(active)
    .bind(default_tenant)
    .fetch_one(conn)
    .await
}

/// Stamp the tombstone and persist it. The `deleted_at IS NULL` guard keeps
/// the database's first timestamp on repeat calls.
pub async fn soft_delete(conn: &mut PgConnection, tenant: &mut Tenant) -> Result<(), sqlx::Error> {
    audit::mark_deleted(&mut tenant.record, Utc::now());
    sqlx::query("UPDATE tenant SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
        .bind(tenant.record.deleted_at)
        .bind(tenant.record.id)
        .execute(conn)
        .await?;
    Ok(())
}
