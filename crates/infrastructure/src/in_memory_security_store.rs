use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use opsgrid_application::{
    AuthorizationRepository, CreateRoleInput, RoleAdminRepository, RoleAssignment, RoleDefinition,
    SubjectGrants, TenantDirectory, UpdateRoleInput,
};
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::DefaultRole;

#[derive(Debug, Clone)]
struct StoredRole {
    tenant_id: TenantId,
    definition: RoleDefinition,
}

#[derive(Debug, Clone)]
struct StoredAssignment {
    tenant_id: TenantId,
    subject: String,
    role_id: Uuid,
    granted_by: String,
    granted_at: String,
}

#[derive(Debug, Default)]
struct SecurityState {
    memberships: HashMap<String, TenantId>,
    roles: Vec<StoredRole>,
    assignments: Vec<StoredAssignment>,
}

/// In-memory security store for local development and tests.
///
/// Implements grant lookup, role administration, and the tenant directory
/// over one shared state so the adapters stay consistent with each other the
/// way the SQL schema keeps its tables consistent.
#[derive(Default)]
pub struct InMemorySecurityStore {
    state: RwLock<SecurityState>,
}

impl InMemorySecurityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl AuthorizationRepository for InMemorySecurityStore {
    async fn load_subject_grants(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<SubjectGrants> {
        let state = self.state.read().await;

        let role_ids: Vec<Uuid> = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.tenant_id == tenant_id && assignment.subject == subject
            })
            .map(|assignment| assignment.role_id)
            .collect();

        let mut permissions = BTreeSet::new();
        for stored in &state.roles {
            if stored.tenant_id == tenant_id && role_ids.contains(&stored.definition.role_id) {
                permissions.extend(stored.definition.permissions.iter().copied());
            }
        }

        Ok(SubjectGrants {
            role_ids,
            permissions,
        })
    }
}

#[async_trait]
impl RoleAdminRepository for InMemorySecurityStore {
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        let state = self.state.read().await;
        let mut roles: Vec<RoleDefinition> = state
            .roles
            .iter()
            .filter(|stored| stored.tenant_id == tenant_id)
            .map(|stored| stored.definition.clone())
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn find_role(
        &self,
        tenant_id: TenantId,
        role_id: Uuid,
    ) -> AppResult<Option<RoleDefinition>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .iter()
            .find(|stored| {
                stored.tenant_id == tenant_id && stored.definition.role_id == role_id
            })
            .map(|stored| stored.definition.clone()))
    }

    async fn create_role(
        &self,
        tenant_id: TenantId,
        input: CreateRoleInput,
        is_default: bool,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.write().await;
        let name = input.name.trim().to_owned();

        if state
            .roles
            .iter()
            .any(|stored| stored.tenant_id == tenant_id && stored.definition.name == name)
        {
            return Err(AppError::DuplicateName(format!(
                "role '{name}' already exists in this tenant"
            )));
        }

        let definition = RoleDefinition {
            role_id: Uuid::new_v4(),
            name,
            description: input.description,
            is_default,
            permissions: input.permissions,
        };

        state.roles.push(StoredRole {
            tenant_id,
            definition: definition.clone(),
        });

        Ok(definition)
    }

    async fn update_role(
        &self,
        tenant_id: TenantId,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut state = self.state.write().await;

        if let Some(new_name) = input.name.as_deref().map(str::trim) {
            let collides = state.roles.iter().any(|stored| {
                stored.tenant_id == tenant_id
                    && stored.definition.role_id != role_id
                    && stored.definition.name == new_name
            });
            if collides {
                return Err(AppError::DuplicateName(format!(
                    "role '{new_name}' already exists in this tenant"
                )));
            }
        }

        let stored = state
            .roles
            .iter_mut()
            .find(|stored| {
                stored.tenant_id == tenant_id && stored.definition.role_id == role_id
            })
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if let Some(name) = input.name {
            stored.definition.name = name.trim().to_owned();
        }
        if let Some(description) = input.description {
            stored.definition.description = description;
        }
        if let Some(permissions) = input.permissions {
            stored.definition.permissions = permissions;
        }

        Ok(stored.definition.clone())
    }

    async fn delete_role(&self, tenant_id: TenantId, role_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;

        let held = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.tenant_id == tenant_id && assignment.role_id == role_id
            })
            .count();
        if held > 0 {
            return Err(AppError::RoleInUse(format!(
                "role '{role_id}' is held by {held} subject(s)"
            )));
        }

        let before = state.roles.len();
        state.roles.retain(|stored| {
            !(stored.tenant_id == tenant_id && stored.definition.role_id == role_id)
        });

        if state.roles.len() == before {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        Ok(())
    }

    async fn assign_role(
        &self,
        tenant_id: TenantId,
        subject: &str,
        role_id: Uuid,
        granted_by: &str,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;

        let already_held = state.assignments.iter().any(|assignment| {
            assignment.tenant_id == tenant_id
                && assignment.subject == subject
                && assignment.role_id == role_id
        });
        if already_held {
            return Ok(false);
        }

        state.assignments.push(StoredAssignment {
            tenant_id,
            subject: subject.to_owned(),
            role_id,
            granted_by: granted_by.to_owned(),
            granted_at: now_rfc3339(),
        });

        Ok(true)
    }

    async fn revoke_role(
        &self,
        tenant_id: TenantId,
        subject: &str,
        role_id: Uuid,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.assignments.len();
        state.assignments.retain(|assignment| {
            !(assignment.tenant_id == tenant_id
                && assignment.subject == subject
                && assignment.role_id == role_id)
        });

        Ok(state.assignments.len() != before)
    }

    async fn roles_for_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Vec<RoleDefinition>> {
        let state = self.state.read().await;

        let held: Vec<Uuid> = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.tenant_id == tenant_id && assignment.subject == subject
            })
            .map(|assignment| assignment.role_id)
            .collect();

        let mut roles: Vec<RoleDefinition> = state
            .roles
            .iter()
            .filter(|stored| {
                stored.tenant_id == tenant_id && held.contains(&stored.definition.role_id)
            })
            .map(|stored| stored.definition.clone())
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn list_assignments(&self, tenant_id: TenantId) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;

        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .iter()
            .filter(|assignment| assignment.tenant_id == tenant_id)
            .map(|assignment| {
                let role_name = state
                    .roles
                    .iter()
                    .find(|stored| stored.definition.role_id == assignment.role_id)
                    .map(|stored| stored.definition.name.clone())
                    .unwrap_or_default();

                RoleAssignment {
                    subject: assignment.subject.clone(),
                    role_id: assignment.role_id,
                    role_name,
                    granted_by: assignment.granted_by.clone(),
                    granted_at: assignment.granted_at.clone(),
                }
            })
            .collect();
        assignments.sort_by(|left, right| {
            left.subject
                .cmp(&right.subject)
                .then_with(|| left.role_name.cmp(&right.role_name))
        });
        Ok(assignments)
    }
}

#[async_trait]
impl TenantDirectory for InMemorySecurityStore {
    async fn resolve_tenant(&self, subject: &str) -> AppResult<Option<TenantId>> {
        let state = self.state.read().await;
        Ok(state.memberships.get(subject).copied())
    }

    async fn provision_tenant(&self, _name: &str, owner_subject: &str) -> AppResult<TenantId> {
        let mut state = self.state.write().await;

        // Matches the unique membership index: one tenant per subject.
        if state.memberships.contains_key(owner_subject) {
            return Err(AppError::Validation(format!(
                "subject '{owner_subject}' already belongs to a tenant"
            )));
        }

        let tenant_id = TenantId::new();
        state
            .memberships
            .insert(owner_subject.to_owned(), tenant_id);

        for role in DefaultRole::all() {
            let role_id = Uuid::new_v4();
            state.roles.push(StoredRole {
                tenant_id,
                definition: RoleDefinition {
                    role_id,
                    name: role.name().to_owned(),
                    description: role.description().to_owned(),
                    is_default: true,
                    permissions: role.permissions(),
                },
            });

            if *role == DefaultRole::Owner {
                state.assignments.push(StoredAssignment {
                    tenant_id,
                    subject: owner_subject.to_owned(),
                    role_id,
                    granted_by: owner_subject.to_owned(),
                    granted_at: now_rfc3339(),
                });
            }
        }

        Ok(tenant_id)
    }
}
