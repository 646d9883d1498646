use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Columns common to every directory record: server-assigned identity,
/// creation stamp and the soft-delete tombstone. Embedded by value in
/// [`Tenant`](super::tenant::Tenant) and [`User`](super::user::User) rather
/// than inherited.
#[derive(Debug, Clone, FromRow)]
pub struct AuditRecord {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A record with a tombstone is logically absent from every default read
/// path; physical rows are never removed.
pub fn is_visible(record: &AuditRecord) -> bool {
    record.deleted_at.is_none()
}

/// Stamp the tombstone. Idempotent: a second call leaves the first timestamp
/// in place.
pub fn mark_deleted(record: &mut AuditRecord, now: DateTime<Utc>) {
    if record.deleted_at.is_none() {
        record.deleted_at = Some(now);
    }
}
