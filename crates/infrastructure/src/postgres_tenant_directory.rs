use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use opsgrid_application::TenantDirectory;
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::DefaultRole;

use crate::postgres_role_admin_repository::{UNIQUE_VIOLATION, insert_grants, is_constraint_violation};

/// PostgreSQL-backed tenant directory.
///
/// Provisioning is a single transaction: the tenant row, the owner
/// membership, the four default roles with their grants, and the owner
/// assignment all land together or not at all.
#[derive(Clone)]
pub struct PostgresTenantDirectory {
    pool: PgPool,
}

impl PostgresTenantDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn resolve_tenant(&self, subject: &str) -> AppResult<Option<TenantId>> {
        let tenant_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT tenant_id
            FROM tenant_memberships
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve tenant: {error}")))?;

        Ok(tenant_id.map(TenantId::from_uuid))
    }

    async fn provision_tenant(&self, name: &str, owner_subject: &str) -> AppResult<TenantId> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let tenant_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO tenants (name)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create tenant: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO tenant_memberships (tenant_id, subject)
            VALUES ($1, $2)
            "#,
        )
        .bind(tenant_id)
        .bind(owner_subject)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            // The unique membership index rejects a second tenant for the
            // same subject.
            if is_constraint_violation(&error, UNIQUE_VIOLATION) {
                AppError::Validation(format!(
                    "subject '{owner_subject}' already belongs to a tenant"
                ))
            } else {
                AppError::Internal(format!("failed to record tenant membership: {error}"))
            }
        })?;

        for role in DefaultRole::all() {
            let role_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO rbac_roles (tenant_id, name, description, is_default)
                VALUES ($1, $2, $3, TRUE)
                RETURNING id
                "#,
            )
            .bind(tenant_id)
            .bind(role.name())
            .bind(role.description())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to seed default role: {error}"))
            })?;

            insert_grants(&mut transaction, role_id, &role.permissions()).await?;

            if *role == DefaultRole::Owner {
                sqlx::query(
                    r#"
                    INSERT INTO rbac_subject_roles (tenant_id, subject, role_id, granted_by)
                    VALUES ($1, $2, $3, $2)
                    "#,
                )
                .bind(tenant_id)
                .bind(owner_subject)
                .bind(role_id)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to assign owner role: {error}"))
                })?;
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(TenantId::from_uuid(tenant_id))
    }
}
