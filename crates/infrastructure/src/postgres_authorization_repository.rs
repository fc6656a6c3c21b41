use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use opsgrid_application::{AuthorizationRepository, SubjectGrants};
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::Permission;

/// PostgreSQL-backed repository for subject grant lookups.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    role_id: uuid::Uuid,
    permission: Option<String>,
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn load_subject_grants(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<SubjectGrants> {
        // LEFT JOIN so a role without grants still counts as a held role;
        // the engine distinguishes "no roles" from "no grant".
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                subject_roles.role_id,
                grants.permission
            FROM rbac_subject_roles AS subject_roles
            LEFT JOIN rbac_role_grants AS grants
                ON grants.role_id = subject_roles.role_id
            WHERE subject_roles.tenant_id = $1
                AND subject_roles.subject = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load subject grants: {error}")))?;

        let mut role_ids = Vec::new();
        let mut permissions = BTreeSet::new();

        for row in rows {
            if !role_ids.contains(&row.role_id) {
                role_ids.push(row.role_id);
            }

            if let Some(permission_value) = row.permission {
                let permission =
                    Permission::from_str(permission_value.as_str()).map_err(|error| {
                        AppError::Internal(format!(
                            "invalid stored permission '{}' for tenant '{}': {error}",
                            permission_value, tenant_id
                        ))
                    })?;
                permissions.insert(permission);
            }
        }

        Ok(SubjectGrants {
            role_ids,
            permissions,
        })
    }
}
