use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgrid_core::{ActorContext, AppResult, TenantId};
use opsgrid_domain::{ActionType, AuditAction, AuditOutcome, FeatureArea, Permission};
use serde_json::Value;

use crate::AuthorizationService;

/// Metadata keys whose values are redacted before an audit event persists.
const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "credential",
    "api_key",
    "authorization",
];

const REDACTED_PLACEHOLDER: &str = "[redacted]";

/// One authorization decision or sensitive-data-access event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Tenant the event occurred in.
    pub tenant_id: TenantId,
    /// Actor subject on whose behalf the operation ran.
    pub actor: String,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Event resource type.
    pub resource_type: String,
    /// Event resource identifier.
    pub resource_id: String,
    /// Operation outcome.
    pub outcome: AuditOutcome,
    /// Free-form metadata; redacted before persistence.
    pub metadata: Value,
}

/// Append-only sink port for audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one event. Events are never updated or deleted here.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Audit log entry projection for the query surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Stable event identifier.
    pub event_id: String,
    /// Actor subject.
    pub actor: String,
    /// Stable action identifier.
    pub action: String,
    /// Event resource type.
    pub resource_type: String,
    /// Event resource identifier.
    pub resource_id: String,
    /// Operation outcome.
    pub outcome: String,
    /// Redacted metadata as persisted.
    pub metadata: Value,
    /// Event timestamp in RFC3339.
    pub created_at: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<String>,
    /// Optional actor subject filter.
    pub actor: Option<String>,
    /// Optional resource type filter.
    pub resource_type: Option<String>,
    /// Lower bound on event time, inclusive.
    pub created_after: Option<DateTime<Utc>>,
    /// Upper bound on event time, exclusive.
    pub created_before: Option<DateTime<Utc>>,
}

/// Repository port for reading tenant audit logs, reverse chronological.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists matching tenant audit entries, newest first.
    async fn list_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>>;
}

/// Fire-and-forget audit event emitter.
///
/// Audit is observability, not a transaction participant: a failing sink must
/// never fail the guarded operation, so emission errors go to the process
/// log at error severity and the caller proceeds.
#[derive(Clone)]
pub struct AuditEmitter {
    repository: Arc<dyn AuditRepository>,
}

impl AuditEmitter {
    /// Creates an emitter over an append-only sink.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Redacts and records one event, swallowing sink failures.
    pub async fn record(&self, mut event: AuditEvent) {
        event.metadata = redact_metadata(event.metadata);

        if let Err(error) = self.repository.append_event(event).await {
            tracing::error!(%error, "failed to append audit event; event dropped");
        }
    }
}

/// Replaces values under sensitive keys with a placeholder, recursively.
#[must_use]
pub fn redact_metadata(value: Value) -> Value {
    match value {
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, entry)| {
                    if is_sensitive_key(key.as_str()) {
                        (key, Value::String(REDACTED_PLACEHOLDER.to_owned()))
                    } else {
                        (key, redact_metadata(entry))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_metadata).collect()),
        other => other,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PATTERNS
        .iter()
        .any(|pattern| key.contains(pattern))
}

/// Application service for the permission-guarded audit query surface.
#[derive(Clone)]
pub struct AuditQueryService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditQueryService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
        }
    }

    /// Returns matching audit entries for auditors, newest first.
    pub async fn list_audit_log(
        &self,
        actor: &ActorContext,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.authorization_service
            .require_permission(
                actor.tenant_id(),
                actor.subject(),
                Permission::new(FeatureArea::Audit, ActionType::View),
            )
            .await?;

        self.repository.list_entries(actor.tenant_id(), query).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use opsgrid_core::{ActorContext, AppError, AppResult, TenantId};
    use opsgrid_domain::{ActionType, AuditAction, AuditOutcome, FeatureArea, Permission};
    use serde_json::json;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::{AuthorizationRepository, AuthorizationService, SubjectGrants};

    use super::{
        AuditEmitter, AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository,
        AuditQueryService, AuditRepository, redact_metadata,
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

    struct FailingAuditRepository {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AuditRepository for FailingAuditRepository {
        async fn append_event(&self, _event: AuditEvent) -> AppResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Internal("audit sink unavailable".to_owned()))
        }
    }

    fn event(metadata: serde_json::Value) -> AuditEvent {
        AuditEvent {
            tenant_id: TenantId::new(),
            actor: "alice".to_owned(),
            action: AuditAction::RecordExported,
            resource_type: "business_record".to_owned(),
            resource_id: "clients".to_owned(),
            outcome: AuditOutcome::Success,
            metadata,
        }
    }

    #[test]
    fn redaction_masks_sensitive_keys_recursively() {
        let redacted = redact_metadata(json!({
            "reason": "export",
            "Password": "hunter2",
            "nested": {"api_key": "k-123", "rows": 4},
            "items": [{"session_token": "t"}],
        }));

        assert_eq!(
            redacted,
            json!({
                "reason": "export",
                "Password": "[redacted]",
                "nested": {"api_key": "[redacted]", "rows": 4},
                "items": [{"session_token": "[redacted]"}],
            })
        );
    }

    #[tokio::test]
    async fn record_redacts_before_persisting() {
        let repository = Arc::new(FakeAuditRepository::default());
        let emitter = AuditEmitter::new(repository.clone());

        emitter.record(event(json!({"credential": "abc"}))).await;

        let events = repository.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata, json!({"credential": "[redacted]"}));
    }

    #[tokio::test]
    async fn sink_failure_does_not_surface_to_the_caller() {
        let repository = Arc::new(FailingAuditRepository {
            attempts: AtomicUsize::new(0),
        });
        let emitter = AuditEmitter::new(repository.clone());

        emitter.record(event(json!({}))).await;

        assert_eq!(repository.attempts.load(Ordering::SeqCst), 1);
    }

    struct FakeAuditLogRepository {
        entries: Vec<AuditLogEntry>,
    }

    #[async_trait]
    impl AuditLogRepository for FakeAuditLogRepository {
        async fn list_entries(
            &self,
            _tenant_id: TenantId,
            _query: AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(self.entries.clone())
        }
    }

    struct FakeAuthorizationRepository {
        grants: HashMap<(TenantId, String), SubjectGrants>,
    }

    #[async_trait]
    impl AuthorizationRepository for FakeAuthorizationRepository {
        async fn load_subject_grants(
            &self,
            tenant_id: TenantId,
            subject: &str,
        ) -> AppResult<SubjectGrants> {
            Ok(self
                .grants
                .get(&(tenant_id, subject.to_owned()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn sample_entry() -> AuditLogEntry {
        AuditLogEntry {
            event_id: Uuid::new_v4().to_string(),
            actor: "alice".to_owned(),
            action: "record.exported".to_owned(),
            resource_type: "business_record".to_owned(),
            resource_id: "clients".to_owned(),
            outcome: "success".to_owned(),
            metadata: json!({}),
            created_at: "2026-01-01T00:00:00Z".to_owned(),
        }
    }

    fn query_service(
        tenant_id: TenantId,
        subject: &str,
        permissions: Vec<Permission>,
    ) -> AuditQueryService {
        let authorization_service = AuthorizationService::new(
            Arc::new(FakeAuthorizationRepository {
                grants: HashMap::from([(
                    (tenant_id, subject.to_owned()),
                    SubjectGrants {
                        role_ids: vec![Uuid::new_v4()],
                        permissions: permissions.into_iter().collect(),
                    },
                )]),
            }),
            AuditEmitter::new(Arc::new(FakeAuditRepository::default())),
        );

        AuditQueryService::new(
            authorization_service,
            Arc::new(FakeAuditLogRepository {
                entries: vec![sample_entry()],
            }),
        )
    }

    #[tokio::test]
    async fn audit_log_requires_the_audit_view_grant() {
        let tenant_id = TenantId::new();
        let service = query_service(
            tenant_id,
            "clerk",
            vec![Permission::new(FeatureArea::Clients, ActionType::View)],
        );

        let result = service
            .list_audit_log(
                &ActorContext::new("clerk", tenant_id),
                AuditLogQuery::default(),
            )
            .await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn auditors_receive_tenant_entries() {
        let tenant_id = TenantId::new();
        let service = query_service(
            tenant_id,
            "auditor",
            vec![Permission::new(FeatureArea::Audit, ActionType::View)],
        );

        let Ok(entries) = service
            .list_audit_log(
                &ActorContext::new("auditor", tenant_id),
                AuditLogQuery::default(),
            )
            .await
        else {
            panic!("audit log listing failed");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "record.exported");
    }
}
