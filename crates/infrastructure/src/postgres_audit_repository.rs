use async_trait::async_trait;
use sqlx::PgPool;

use opsgrid_application::{AuditEvent, AuditRepository};
use opsgrid_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit sink.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        // Metadata travels as text and is cast server-side; the jsonb
        // column keeps the stored shape queryable.
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (tenant_id, actor, action, resource_type, resource_id, outcome, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb)
            "#,
        )
        .bind(event.tenant_id.as_uuid())
        .bind(event.actor.as_str())
        .bind(event.action.as_str())
        .bind(event.resource_type.as_str())
        .bind(event.resource_id.as_str())
        .bind(event.outcome.as_str())
        .bind(event.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
