use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use opsgrid_application::{BusinessRecord, RecordListQuery, RecordRepository};
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::FeatureArea;

/// PostgreSQL-backed repository for tenant-owned business records.
///
/// Every statement filters by tenant in the WHERE clause; rows from other
/// tenants are never visible, not merely hidden after the fact.
#[derive(Clone)]
pub struct PostgresRecordRepository {
    pool: PgPool,
}

impl PostgresRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    record_id: Uuid,
    tenant_id: Uuid,
    kind: String,
    data: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

const RECORD_COLUMNS: &str = r#"
    id AS record_id,
    tenant_id,
    kind,
    data::text AS data,
    created_by,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    async fn create_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        data: serde_json::Value,
        created_by: &str,
    ) -> AppResult<BusinessRecord> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            INSERT INTO business_records (tenant_id, kind, data, created_by)
            VALUES ($1, $2, $3::jsonb, $4)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(data.to_string())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create record: {error}")))?;

        map_record(row)
    }

    async fn find_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<Option<BusinessRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM business_records
            WHERE tenant_id = $1 AND kind = $2 AND id = $3
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find record: {error}")))?;

        row.map(map_record).transpose()
    }

    async fn list_records(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        query: RecordListQuery,
    ) -> AppResult<Vec<BusinessRecord>> {
        // The caller decides the page size; exports pass the full range.
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM business_records
            WHERE tenant_id = $1 AND kind = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list records: {error}")))?;

        rows.into_iter().map(map_record).collect()
    }

    async fn update_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
        data: serde_json::Value,
    ) -> AppResult<Option<BusinessRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            UPDATE business_records
            SET data = $4::jsonb, updated_at = now()
            WHERE tenant_id = $1 AND kind = $2 AND id = $3
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(record_id)
        .bind(data.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update record: {error}")))?;

        row.map(map_record).transpose()
    }

    async fn delete_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM business_records
            WHERE tenant_id = $1 AND kind = $2 AND id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete record: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}

fn map_record(row: RecordRow) -> AppResult<BusinessRecord> {
    let kind = row.kind.parse::<FeatureArea>().map_err(|error| {
        AppError::Internal(format!(
            "invalid stored record kind '{}': {error}",
            row.kind
        ))
    })?;

    let data = serde_json::from_str(row.data.as_str()).map_err(|error| {
        AppError::Internal(format!(
            "invalid stored record payload for '{}': {error}",
            row.record_id
        ))
    })?;

    Ok(BusinessRecord {
        record_id: row.record_id,
        tenant_id: TenantId::from_uuid(row.tenant_id),
        kind,
        data,
        created_by: row.created_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
