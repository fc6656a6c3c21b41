use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use opsgrid_application::{
    CreateRoleInput, RoleAdminRepository, RoleAssignment, RoleDefinition, UpdateRoleInput,
};
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::Permission;

pub(crate) const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL-backed repository for role administration.
#[derive(Clone)]
pub struct PostgresRoleAdminRepository {
    pool: PgPool,
}

impl PostgresRoleAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: Uuid,
    role_name: String,
    description: String,
    is_default: bool,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    subject: String,
    role_id: Uuid,
    role_name: String,
    granted_by: String,
    granted_at: String,
}

const ROLE_WITH_GRANTS: &str = r#"
    SELECT
        roles.id AS role_id,
        roles.name AS role_name,
        roles.description,
        roles.is_default,
        grants.permission
    FROM rbac_roles AS roles
    LEFT JOIN rbac_role_grants AS grants
        ON grants.role_id = roles.id
"#;

#[async_trait]
impl RoleAdminRepository for PostgresRoleAdminRepository {
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "{ROLE_WITH_GRANTS} WHERE roles.tenant_id = $1 ORDER BY roles.name, grants.permission"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows, tenant_id)
    }

    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_id: Uuid,
    ) -> AppResult<Option<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "{ROLE_WITH_GRANTS} WHERE roles.tenant_id = $1 AND roles.id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?;

        Ok(aggregate_roles(rows, tenant_id)?.into_iter().next())
    }

    async fn create_role(
        &self,
        tenant_id: TenantId,
        input: CreateRoleInput,
        is_default: bool,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;

        let role_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO rbac_roles (tenant_id, name, description, is_default)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(input.name.trim())
        .bind(input.description.as_str())
        .bind(is_default)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_name_conflict(error, input.name.as_str()))?;

        insert_grants(&mut transaction, role_id, &input.permissions).await?;
        commit(transaction).await?;

        Ok(RoleDefinition {
            role_id,
            name: input.name.trim().to_owned(),
            description: input.description,
            is_default,
            permissions: input.permissions,
        })
    }

    async fn update_role(
        &self,
        tenant_id: TenantId,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;

        let updated_name = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE rbac_roles
            SET name = COALESCE($3, name),
                description = COALESCE($4, description)
            WHERE tenant_id = $1 AND id = $2
            RETURNING name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description.as_deref())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            map_role_name_conflict(error, input.name.as_deref().unwrap_or_default())
        })?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if let Some(permissions) = input.permissions.as_deref() {
            sqlx::query("DELETE FROM rbac_role_grants WHERE role_id = $1")
                .bind(role_id)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to replace role grants: {error}"))
                })?;

            insert_grants(&mut transaction, role_id, permissions).await?;
        }

        commit(transaction).await?;

        self.find_role(tenant_id, role_id).await?.ok_or_else(|| {
            AppError::Internal(format!("role '{updated_name}' vanished after update"))
        })
    }

    async fn delete_role(&self, tenant_id: TenantId, role_id: Uuid) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;

        let assignment_count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM rbac_subject_roles
            WHERE tenant_id = $1 AND role_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count assignments: {error}")))?;

        if assignment_count > 0 {
            return Err(AppError::RoleInUse(format!(
                "role '{role_id}' is held by {assignment_count} subject(s)"
            )));
        }

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM rbac_roles
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            // The RESTRICT constraint closes the race between count and
            // delete when an assignment lands in between.
            if is_constraint_violation(&error, FOREIGN_KEY_VIOLATION) {
                AppError::RoleInUse(format!("role '{role_id}' is still assigned"))
            } else {
                AppError::Internal(format!("failed to delete role: {error}"))
            }
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        commit(transaction).await
    }

    async fn assign_role(
        &self,
        tenant_id: TenantId,
        subject: &str,
        role_id: Uuid,
        granted_by: &str,
    ) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO rbac_subject_roles (tenant_id, subject, role_id, granted_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, subject, role_id) DO NOTHING
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .bind(role_id)
        .bind(granted_by)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn revoke_role(
        &self,
        tenant_id: TenantId,
        subject: &str,
        role_id: Uuid,
    ) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM rbac_subject_roles
            WHERE tenant_id = $1 AND subject = $2 AND role_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke role: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn roles_for_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                roles.is_default,
                grants.permission
            FROM rbac_subject_roles AS subject_roles
            INNER JOIN rbac_roles AS roles
                ON roles.id = subject_roles.role_id
            LEFT JOIN rbac_role_grants AS grants
                ON grants.role_id = roles.id
            WHERE subject_roles.tenant_id = $1
                AND subject_roles.subject = $2
            ORDER BY roles.name, grants.permission
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list subject roles: {error}")))?;

        aggregate_roles(rows, tenant_id)
    }

    async fn list_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                subject_roles.subject,
                subject_roles.role_id,
                roles.name AS role_name,
                subject_roles.granted_by,
                to_char(subject_roles.granted_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS granted_at
            FROM rbac_subject_roles AS subject_roles
            INNER JOIN rbac_roles AS roles
                ON roles.id = subject_roles.role_id
            WHERE subject_roles.tenant_id = $1
            ORDER BY subject_roles.subject, roles.name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list assignments: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RoleAssignment {
                subject: row.subject,
                role_id: row.role_id,
                role_name: row.role_name,
                granted_by: row.granted_by,
                granted_at: row.granted_at,
            })
            .collect())
    }
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'_, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

/// Persists a grant set for one role inside an open transaction.
pub(crate) async fn insert_grants(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: Uuid,
    permissions: &[Permission],
) -> AppResult<()> {
    for permission in permissions {
        sqlx::query(
            r#"
            INSERT INTO rbac_role_grants (role_id, permission)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission.storage_value())
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist role grants: {error}")))?;
    }

    Ok(())
}

fn aggregate_roles(rows: Vec<RoleRow>, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
    let mut by_id: HashMap<Uuid, RoleDefinition> = HashMap::new();

    for row in rows {
        let role = by_id.entry(row.role_id).or_insert_with(|| RoleDefinition {
            role_id: row.role_id,
            name: row.role_name.clone(),
            description: row.description.clone(),
            is_default: row.is_default,
            permissions: Vec::new(),
        });

        if let Some(permission_value) = row.permission {
            let permission = Permission::from_str(permission_value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission '{}' for tenant '{}': {error}",
                    permission_value, tenant_id
                ))
            })?;

            role.permissions.push(permission);
        }
    }

    let mut roles = by_id.into_values().collect::<Vec<_>>();
    roles.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(roles)
}

fn map_role_name_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if is_constraint_violation(&error, UNIQUE_VIOLATION) {
        return AppError::DuplicateName(format!(
            "role '{role_name}' already exists in this tenant"
        ));
    }

    AppError::Internal(format!("failed to persist role: {error}"))
}

pub(crate) fn is_constraint_violation(error: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(database_error) = error {
        return database_error.code().as_deref() == Some(code);
    }

    false
}
