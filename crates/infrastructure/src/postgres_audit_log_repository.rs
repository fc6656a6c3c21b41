use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use opsgrid_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use opsgrid_core::{AppError, AppResult, TenantId};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const MAX_OFFSET: i64 = 5_000;

/// PostgreSQL-backed read side of the tenant audit log.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    event_id: Uuid,
    actor: String,
    action: String,
    resource_type: String,
    resource_id: String,
    outcome: String,
    metadata: String,
    created_at: String,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let limit = clamp_limit(query.limit);
        let offset = clamp_offset(query.offset);

        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id AS event_id,
                actor,
                action,
                resource_type,
                resource_id,
                outcome,
                metadata::text AS metadata,
                to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM audit_events
            WHERE tenant_id = $1
                AND ($2::text IS NULL OR action = $2)
                AND ($3::text IS NULL OR actor = $3)
                AND ($4::text IS NULL OR resource_type = $4)
                AND ($5::timestamptz IS NULL OR created_at >= $5)
                AND ($6::timestamptz IS NULL OR created_at < $6)
            ORDER BY created_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.action.as_deref())
        .bind(query.actor.as_deref())
        .bind(query.resource_type.as_deref())
        .bind(query.created_after)
        .bind(query.created_before)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        rows.into_iter()
            .map(|row| {
                let metadata = serde_json::from_str(row.metadata.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid stored audit metadata for event '{}': {error}",
                        row.event_id
                    ))
                })?;

                Ok(AuditLogEntry {
                    event_id: row.event_id.to_string(),
                    actor: row.actor,
                    action: row.action,
                    resource_type: row.resource_type,
                    resource_id: row.resource_id,
                    outcome: row.outcome,
                    metadata,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

fn clamp_limit(limit: usize) -> i64 {
    if limit == 0 {
        return DEFAULT_PAGE_SIZE;
    }

    i64::try_from(limit).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)
}

fn clamp_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(MAX_OFFSET).min(MAX_OFFSET)
}
