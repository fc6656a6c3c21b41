use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use opsgrid_core::{AppError, AppResult, TenantId};
use opsgrid_domain::{AuditAction, AuditOutcome, Permission};
use serde_json::json;
use uuid::Uuid;

use crate::{AuditEmitter, AuditEvent};

/// Everything the decision procedure needs about one subject in one tenant,
/// resolved in a single repository round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubjectGrants {
    /// Roles the subject holds in the tenant.
    pub role_ids: Vec<Uuid>,
    /// Distinct permissions granted by any of those roles.
    pub permissions: BTreeSet<Permission>,
}

/// Repository port for grant lookups.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Resolves held roles and their union of permissions for a subject,
    /// scoped to one tenant. One query: assignments joined to role grants.
    async fn load_subject_grants(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<SubjectGrants>;
}

/// Why a permission check denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No actor identity was presented.
    AuthRequired,
    /// The subject holds no role in the tenant.
    NoRolesAssigned,
    /// The subject's roles do not grant the permission, or the permission is
    /// not in the catalog.
    PermissionDenied,
}

impl DenyReason {
    /// Returns a stable storage value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::NoRolesAssigned => "no_roles_assigned",
            Self::PermissionDenied => "permission_denied",
        }
    }
}

/// Outcome of one permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// At least one held role grants the permission.
    Allow,
    /// The check denied; the reason stays internal to logs and audit.
    Deny(DenyReason),
}

/// Application service for tenant-scoped authorization checks.
///
/// Union-of-roles model: holding any role that grants the permission is
/// sufficient and there is no explicit-deny override. Checks re-resolve
/// current grant state on every call; nothing is cached across requests.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
    audit_emitter: AuditEmitter,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>, audit_emitter: AuditEmitter) -> Self {
        Self {
            repository,
            audit_emitter,
        }
    }

    /// Ensures a subject has the required permission in the tenant scope.
    pub async fn require_permission(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
    ) -> AppResult<()> {
        match self.check(tenant_id, subject, permission).await? {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(DenyReason::AuthRequired) => Err(AppError::AuthRequired),
            AccessDecision::Deny(DenyReason::NoRolesAssigned) => {
                Err(AppError::NoRolesAssigned(format!(
                    "subject '{subject}' holds no role in tenant '{tenant_id}'"
                )))
            }
            AccessDecision::Deny(DenyReason::PermissionDenied) => {
                Err(AppError::PermissionDenied(format!(
                    "subject '{subject}' lacks permission '{permission}' in tenant '{tenant_id}'"
                )))
            }
        }
    }

    /// Runs the decision procedure and records the decision.
    ///
    /// Repository failures deny closed: the error propagates as `Internal`
    /// and is never converted into an allow.
    pub async fn check(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
    ) -> AppResult<AccessDecision> {
        if subject.trim().is_empty() {
            let decision = AccessDecision::Deny(DenyReason::AuthRequired);
            self.record_decision(tenant_id, subject, permission, decision)
                .await;
            return Ok(decision);
        }

        let grants = match self.repository.load_subject_grants(tenant_id, subject).await {
            Ok(grants) => grants,
            Err(error) => {
                self.record_error(tenant_id, subject, permission, &error)
                    .await;
                return Err(AppError::Internal(format!(
                    "authorization check failed closed: {error}"
                )));
            }
        };

        let decision = decide(&grants, permission);
        self.record_decision(tenant_id, subject, permission, decision)
            .await;

        Ok(decision)
    }

    async fn record_decision(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
        decision: AccessDecision,
    ) {
        let (outcome, metadata) = match decision {
            AccessDecision::Allow => (AuditOutcome::Allow, json!({})),
            AccessDecision::Deny(reason) => {
                (AuditOutcome::Deny, json!({ "reason": reason.as_str() }))
            }
        };

        self.audit_emitter
            .record(AuditEvent {
                tenant_id,
                actor: subject.to_owned(),
                action: AuditAction::AuthorizationDecided,
                resource_type: "permission".to_owned(),
                resource_id: permission.storage_value(),
                outcome,
                metadata,
            })
            .await;
    }

    async fn record_error(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
        error: &AppError,
    ) {
        self.audit_emitter
            .record(AuditEvent {
                tenant_id,
                actor: subject.to_owned(),
                action: AuditAction::AuthorizationDecided,
                resource_type: "permission".to_owned(),
                resource_id: permission.storage_value(),
                outcome: AuditOutcome::Error,
                metadata: json!({ "error": error.to_string() }),
            })
            .await;
    }
}

/// Pure union-of-roles decision over already-fetched grants.
fn decide(grants: &SubjectGrants, permission: Permission) -> AccessDecision {
    if grants.role_ids.is_empty() {
        return AccessDecision::Deny(DenyReason::NoRolesAssigned);
    }

    // An unknown catalog pair is never implicitly granted.
    if !permission.is_seeded() {
        return AccessDecision::Deny(DenyReason::PermissionDenied);
    }

    if grants.permissions.contains(&permission) {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny(DenyReason::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use opsgrid_core::{AppError, AppResult, TenantId};
    use opsgrid_domain::{ActionType, FeatureArea, Permission};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::{AuditEmitter, AuditEvent, AuditRepository};

    use super::{
        AccessDecision, AuthorizationRepository, AuthorizationService, DenyReason, SubjectGrants,
    };

    #[derive(Default)]
    struct FakeAuditRepository {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditRepository for FakeAuditRepository {
        async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAuthorizationRepository {
        grants: HashMap<(TenantId, String), SubjectGrants>,
        fail: bool,
    }

    #[async_trait]
    impl AuthorizationRepository for FakeAuthorizationRepository {
        async fn load_subject_grants(
            &self,
            tenant_id: TenantId,
            subject: &str,
        ) -> AppResult<SubjectGrants> {
            if self.fail {
                return Err(AppError::Internal("connection reset".to_owned()));
            }

            Ok(self
                .grants
                .get(&(tenant_id, subject.to_owned()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn grants(permissions: &[Permission]) -> SubjectGrants {
        SubjectGrants {
            role_ids: vec![Uuid::new_v4()],
            permissions: permissions.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn service(
        repository: FakeAuthorizationRepository,
    ) -> (AuthorizationService, Arc<FakeAuditRepository>) {
        let audit_repository = Arc::new(FakeAuditRepository::default());
        let service = AuthorizationService::new(
            Arc::new(repository),
            AuditEmitter::new(audit_repository.clone()),
        );
        (service, audit_repository)
    }

    const CLIENTS_VIEW: Permission = Permission::new(FeatureArea::Clients, ActionType::View);
    const CLIENTS_EDIT: Permission = Permission::new(FeatureArea::Clients, ActionType::Edit);

    #[tokio::test]
    async fn granted_permission_allows() {
        let tenant_id = TenantId::new();
        let (service, _) = service(FakeAuthorizationRepository {
            grants: HashMap::from([((tenant_id, "u1".to_owned()), grants(&[CLIENTS_VIEW]))]),
            fail: false,
        });

        let decision = service.check(tenant_id, "u1", CLIENTS_VIEW).await;
        assert_eq!(decision.ok(), Some(AccessDecision::Allow));
    }

    #[tokio::test]
    async fn held_roles_without_the_grant_deny() {
        let tenant_id = TenantId::new();
        let (service, _) = service(FakeAuthorizationRepository {
            grants: HashMap::from([((tenant_id, "u1".to_owned()), grants(&[CLIENTS_VIEW]))]),
            fail: false,
        });

        let result = service.require_permission(tenant_id, "u1", CLIENTS_EDIT).await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn subject_without_roles_is_distinguished() {
        let tenant_id = TenantId::new();
        let (service, _) = service(FakeAuthorizationRepository::default());

        let result = service.require_permission(tenant_id, "u2", CLIENTS_VIEW).await;
        assert!(matches!(result, Err(AppError::NoRolesAssigned(_))));
    }

    #[tokio::test]
    async fn blank_subject_requires_authentication() {
        let tenant_id = TenantId::new();
        let (service, _) = service(FakeAuthorizationRepository::default());

        let result = service.require_permission(tenant_id, "  ", CLIENTS_VIEW).await;
        assert!(matches!(result, Err(AppError::AuthRequired)));
    }

    #[tokio::test]
    async fn roles_in_another_tenant_never_bleed() {
        let home_tenant = TenantId::new();
        let other_tenant = TenantId::new();
        let (service, _) = service(FakeAuthorizationRepository {
            grants: HashMap::from([((home_tenant, "u1".to_owned()), grants(&[CLIENTS_VIEW]))]),
            fail: false,
        });

        let decision = service.check(other_tenant, "u1", CLIENTS_VIEW).await;
        assert_eq!(
            decision.ok(),
            Some(AccessDecision::Deny(DenyReason::NoRolesAssigned))
        );
    }

    #[tokio::test]
    async fn uncataloged_pair_denies_even_with_roles() {
        let tenant_id = TenantId::new();
        let uncataloged = Permission::new(FeatureArea::Roles, ActionType::Export);
        let (service, _) = service(FakeAuthorizationRepository {
            grants: HashMap::from([(
                (tenant_id, "u1".to_owned()),
                // A grants row for the pair exists, but the catalog does not
                // know it, so the check must still deny.
                grants(&[uncataloged]),
            )]),
            fail: false,
        });

        let decision = service.check(tenant_id, "u1", uncataloged).await;
        assert_eq!(
            decision.ok(),
            Some(AccessDecision::Deny(DenyReason::PermissionDenied))
        );
    }

    #[tokio::test]
    async fn store_failure_fails_closed_and_audits() {
        let tenant_id = TenantId::new();
        let (service, audit_repository) = service(FakeAuthorizationRepository {
            grants: HashMap::new(),
            fail: true,
        });

        let result = service.check(tenant_id, "u1", CLIENTS_VIEW).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let events = audit_repository.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].outcome,
            opsgrid_domain::AuditOutcome::Error
        );
    }

    #[tokio::test]
    async fn every_decision_is_audited() {
        let tenant_id = TenantId::new();
        let (service, audit_repository) = service(FakeAuthorizationRepository {
            grants: HashMap::from([((tenant_id, "u1".to_owned()), grants(&[CLIENTS_VIEW]))]),
            fail: false,
        });

        let _ = service.check(tenant_id, "u1", CLIENTS_VIEW).await;
        let _ = service.check(tenant_id, "u1", CLIENTS_EDIT).await;

        let events = audit_repository.events.lock().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, opsgrid_domain::AuditOutcome::Allow);
        assert_eq!(events[1].outcome, opsgrid_domain::AuditOutcome::Deny);
    }
}
