use sqlx::PgPool;

use opsgrid_core::{AppError, AppResult};

/// Deletes audit events older than the retention window.
///
/// This is the only code path that removes audit rows; the serving API has
/// no delete surface for them. Returns the number of rows purged.
pub async fn purge_expired_audit_events(pool: &PgPool, retention_days: u32) -> AppResult<u64> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM audit_events
        WHERE created_at < now() - make_interval(days => $1)
        "#,
    )
    .bind(i32::try_from(retention_days).unwrap_or(i32::MAX))
    .execute(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to purge audit events: {error}")))?
    .rows_affected();

    if deleted > 0 {
        tracing::info!(deleted, retention_days, "purged expired audit events");
    }

    Ok(deleted)
}
