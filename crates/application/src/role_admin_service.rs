use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use opsgrid_core::{ActorContext, AppError, AppResult, NonEmptyString, TenantId};
use opsgrid_domain::{ActionType, AuditAction, AuditOutcome, FeatureArea, Permission};
use serde_json::json;
use uuid::Uuid;

use crate::{AuditEmitter, AuditEvent, AuthorizationService};

/// Role definition returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: Uuid,
    /// Unique role name in tenant scope.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Indicates a system-seeded default role.
    pub is_default: bool,
    /// Effective role grants.
    pub permissions: Vec<Permission>,
}

/// Assignment projection mapping a subject to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Subject identifier.
    pub subject: String,
    /// Role identifier.
    pub role_id: Uuid,
    /// Role name.
    pub role_name: String,
    /// Subject that granted the assignment.
    pub granted_by: String,
    /// Assignment timestamp in RFC3339.
    pub granted_at: String,
}

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name in tenant scope.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Grants to attach to the role.
    pub permissions: Vec<Permission>,
}

/// Input payload for role updates. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRoleInput {
    /// New role name.
    pub name: Option<String>,
    /// New role description.
    pub description: Option<String>,
    /// Replacement grant set.
    pub permissions: Option<Vec<Permission>>,
}

/// Repository port for role and assignment administration.
///
/// Uniqueness races (duplicate names, duplicate grants, duplicate
/// assignments) are closed by storage constraints, not pre-checks;
/// implementations translate constraint violations to the domain errors.
#[async_trait]
pub trait RoleAdminRepository: Send + Sync {
    /// Lists all tenant roles with effective grants.
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>>;

    /// Looks up a single role in tenant scope.
    async fn find_role(&self, tenant_id: TenantId, role_id: Uuid)
    -> AppResult<Option<RoleDefinition>>;

    /// Creates a role and attaches grants. Fails with `DuplicateName` when
    /// the name already exists in the tenant.
    async fn create_role(
        &self,
        tenant_id: TenantId,
        input: CreateRoleInput,
        is_default: bool,
    ) -> AppResult<RoleDefinition>;

    /// Applies the update and replaces the grant set when one is supplied.
    async fn update_role(
        &self,
        tenant_id: TenantId,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition>;

    /// Deletes a role. Fails with `RoleInUse` while assignments reference it.
    async fn delete_role(&self, tenant_id: TenantId, role_id: Uuid) -> AppResult<()>;

    /// Assigns a role to a subject; assigning an already-held role is a no-op.
    /// Returns whether a new assignment row was created.
    async fn assign_role(
        &self,
        tenant_id: TenantId,
        subject: &str,
        role_id: Uuid,
        granted_by: &str,
    ) -> AppResult<bool>;

    /// Removes an assignment; revoking an unheld role is a no-op.
    /// Returns whether an assignment row was removed.
    async fn revoke_role(&self, tenant_id: TenantId, subject: &str, role_id: Uuid)
    -> AppResult<bool>;

    /// Lists the roles a subject holds in tenant scope.
    async fn roles_for_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Vec<RoleDefinition>>;

    /// Lists current role assignments in tenant scope.
    async fn list_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>>;
}

/// Application service for role administration workflows.
#[derive(Clone)]
pub struct RoleAdminService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn RoleAdminRepository>,
    audit_emitter: AuditEmitter,
}

impl RoleAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn RoleAdminRepository>,
        audit_emitter: AuditEmitter,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            audit_emitter,
        }
    }

    /// Returns the seeded permission catalog.
    pub async fn list_permissions(&self, actor: &ActorContext) -> AppResult<Vec<Permission>> {
        self.require(actor, ActionType::View).await?;
        Ok(Permission::catalog().to_vec())
    }

    /// Returns tenant roles for administrative users.
    pub async fn list_roles(&self, actor: &ActorContext) -> AppResult<Vec<RoleDefinition>> {
        self.require(actor, ActionType::View).await?;
        self.repository.list_roles(actor.tenant_id()).await
    }

    /// Creates a custom role and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &ActorContext,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.require(actor, ActionType::Create).await?;
        validate_grants(&input.permissions)?;
        NonEmptyString::new(input.name.as_str())?;

        let role = self
            .repository
            .create_role(actor.tenant_id(), input, false)
            .await?;

        self.record(
            actor,
            AuditAction::SecurityRoleCreated,
            role.role_id,
            json!({ "name": role.name }),
        )
        .await;

        Ok(role)
    }

    /// Updates a role, guarding default roles against non-cosmetic changes.
    pub async fn update_role(
        &self,
        actor: &ActorContext,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.require(actor, ActionType::Edit).await?;

        if let Some(permissions) = input.permissions.as_deref() {
            validate_grants(permissions)?;
        }

        let existing = self
            .repository
            .find_role(actor.tenant_id(), role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if existing.is_default {
            if input.name.as_deref().is_some_and(|name| name != existing.name) {
                return Err(AppError::ProtectedRole(format!(
                    "default role '{}' cannot be renamed",
                    existing.name
                )));
            }

            if let Some(permissions) = input.permissions.as_deref() {
                let requested: BTreeSet<_> = permissions.iter().copied().collect();
                let current: BTreeSet<_> = existing.permissions.iter().copied().collect();
                if requested != current {
                    return Err(AppError::ProtectedRole(format!(
                        "default role '{}' has a policy-fixed permission set",
                        existing.name
                    )));
                }
            }
        }

        let role = self
            .repository
            .update_role(actor.tenant_id(), role_id, input)
            .await?;

        self.record(
            actor,
            AuditAction::SecurityRoleUpdated,
            role.role_id,
            json!({ "name": role.name }),
        )
        .await;

        Ok(role)
    }

    /// Deletes a role that no subject currently holds.
    pub async fn delete_role(&self, actor: &ActorContext, role_id: Uuid) -> AppResult<()> {
        self.require(actor, ActionType::Delete).await?;

        let existing = self
            .repository
            .find_role(actor.tenant_id(), role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if existing.is_default {
            return Err(AppError::ProtectedRole(format!(
                "default role '{}' cannot be deleted",
                existing.name
            )));
        }

        self.repository
            .delete_role(actor.tenant_id(), role_id)
            .await?;

        self.record(
            actor,
            AuditAction::SecurityRoleDeleted,
            role_id,
            json!({ "name": existing.name }),
        )
        .await;

        Ok(())
    }

    /// Assigns a role to a subject. Assigning an already-held role is a no-op.
    pub async fn assign_role(
        &self,
        actor: &ActorContext,
        subject: &str,
        role_id: Uuid,
    ) -> AppResult<()> {
        self.require(actor, ActionType::Edit).await?;

        self.repository
            .find_role(actor.tenant_id(), role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        let created = self
            .repository
            .assign_role(actor.tenant_id(), subject, role_id, actor.subject())
            .await?;

        if created {
            self.record(
                actor,
                AuditAction::SecurityRoleAssigned,
                role_id,
                json!({ "subject": subject }),
            )
            .await;
        }

        Ok(())
    }

    /// Revokes a role from a subject. Revoking an unheld role is a no-op.
    pub async fn revoke_role(
        &self,
        actor: &ActorContext,
        subject: &str,
        role_id: Uuid,
    ) -> AppResult<()> {
        self.require(actor, ActionType::Edit).await?;

        let removed = self
            .repository
            .revoke_role(actor.tenant_id(), subject, role_id)
            .await?;

        if removed {
            self.record(
                actor,
                AuditAction::SecurityRoleRevoked,
                role_id,
                json!({ "subject": subject }),
            )
            .await;
        }

        Ok(())
    }

    /// Returns the roles a subject holds in the actor's tenant.
    pub async fn roles_for_subject(
        &self,
        actor: &ActorContext,
        subject: &str,
    ) -> AppResult<Vec<RoleDefinition>> {
        self.require(actor, ActionType::View).await?;
        self.repository
            .roles_for_subject(actor.tenant_id(), subject)
            .await
    }

    /// Returns role assignments for administrative users.
    pub async fn list_assignments(&self, actor: &ActorContext) -> AppResult<Vec<RoleAssignment>> {
        self.require(actor, ActionType::View).await?;
        self.repository.list_assignments(actor.tenant_id()).await
    }

    async fn require(&self, actor: &ActorContext, action: ActionType) -> AppResult<()> {
        self.authorization_service
            .require_permission(
                actor.tenant_id(),
                actor.subject(),
                Permission::new(FeatureArea::Roles, action),
            )
            .await
    }

    async fn record(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        role_id: Uuid,
        metadata: serde_json::Value,
    ) {
        self.audit_emitter
            .record(AuditEvent {
                tenant_id: actor.tenant_id(),
                actor: actor.subject().to_owned(),
                action,
                resource_type: "rbac_role".to_owned(),
                resource_id: role_id.to_string(),
                outcome: AuditOutcome::Success,
                metadata,
            })
            .await;
    }
}

fn validate_grants(permissions: &[Permission]) -> AppResult<()> {
    for permission in permissions {
        if !permission.is_seeded() {
            return Err(AppError::Validation(format!(
                "permission '{permission}' is not in the catalog"
            )));
        }
    }

    Ok(())
}
