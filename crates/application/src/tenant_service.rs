use std::sync::Arc;

use async_trait::async_trait;
use opsgrid_core::{ActorContext, AppError, AppResult, TenantId};
use opsgrid_domain::{AuditAction, AuditOutcome};
use serde_json::json;

use crate::{AuditEmitter, AuditEvent};

/// Port consumed from the external authentication layer: maps an opaque,
/// already-authenticated subject to its tenant.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Resolves the tenant a subject belongs to, if any.
    async fn resolve_tenant(&self, subject: &str) -> AppResult<Option<TenantId>>;

    /// Creates a tenant with its default roles and makes the subject its
    /// owner. The whole seed runs atomically at the storage layer.
    async fn provision_tenant(&self, name: &str, owner_subject: &str) -> AppResult<TenantId>;
}

/// Application service for tenant resolution and provisioning.
#[derive(Clone)]
pub struct TenantService {
    directory: Arc<dyn TenantDirectory>,
    audit_emitter: AuditEmitter,
}

impl TenantService {
    /// Creates a new tenant service from required dependencies.
    #[must_use]
    pub fn new(directory: Arc<dyn TenantDirectory>, audit_emitter: AuditEmitter) -> Self {
        Self {
            directory,
            audit_emitter,
        }
    }

    /// Resolves an actor context for a subject, provisioning a personal
    /// tenant on first contact.
    pub async fn actor_context(&self, subject: &str) -> AppResult<ActorContext> {
        if subject.trim().is_empty() {
            return Err(AppError::AuthRequired);
        }

        if let Some(tenant_id) = self.directory.resolve_tenant(subject).await? {
            return Ok(ActorContext::new(subject, tenant_id));
        }

        let tenant_id = self.provision(subject, subject).await?;
        Ok(ActorContext::new(subject, tenant_id))
    }

    /// Provisions a named tenant owned by the given subject.
    pub async fn provision(&self, name: &str, owner_subject: &str) -> AppResult<TenantId> {
        if owner_subject.trim().is_empty() {
            return Err(AppError::AuthRequired);
        }

        let tenant_id = self.directory.provision_tenant(name, owner_subject).await?;

        self.audit_emitter
            .record(AuditEvent {
                tenant_id,
                actor: owner_subject.to_owned(),
                action: AuditAction::TenantProvisioned,
                resource_type: "tenant".to_owned(),
                resource_id: tenant_id.to_string(),
                outcome: AuditOutcome::Success,
                metadata: json!({ "name": name }),
            })
            .await;

        Ok(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use opsgrid_core::{AppError, AppResult, TenantId};
    use tokio::sync::Mutex;

    use crate::{AuditEmitter, AuditEvent, AuditRepository};

    use super::{TenantDirectory, TenantService};

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
    struct FakeTenantDirectory {
        memberships: Mutex<Vec<(String, TenantId)>>,
    }

    #[async_trait]
    impl TenantDirectory for FakeTenantDirectory {
        async fn resolve_tenant(&self, subject: &str) -> AppResult<Option<TenantId>> {
            Ok(self
                .memberships
                .lock()
                .await
                .iter()
                .find(|(stored, _)| stored == subject)
                .map(|(_, tenant_id)| *tenant_id))
        }

        async fn provision_tenant(&self, _name: &str, owner_subject: &str) -> AppResult<TenantId> {
            let tenant_id = TenantId::new();
            self.memberships
                .lock()
                .await
                .push((owner_subject.to_owned(), tenant_id));
            Ok(tenant_id)
        }
    }

    #[tokio::test]
    async fn first_contact_provisions_a_tenant() {
        let audit_repository = Arc::new(FakeAuditRepository::default());
        let service = TenantService::new(
            Arc::new(FakeTenantDirectory::default()),
            AuditEmitter::new(audit_repository.clone()),
        );

        let Ok(first) = service.actor_context("alice").await else {
            panic!("resolution failed");
        };
        let Ok(second) = service.actor_context("alice").await else {
            panic!("resolution failed");
        };

        assert_eq!(first.tenant_id(), second.tenant_id());
        assert_eq!(audit_repository.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_subject_is_rejected() {
        let service = TenantService::new(
            Arc::new(FakeTenantDirectory::default()),
            AuditEmitter::new(Arc::new(FakeAuditRepository::default())),
        );

        let result = service.actor_context("   ").await;
        assert!(matches!(result, Err(AppError::AuthRequired)));
    }
}
