use std::sync::Arc;

use async_trait::async_trait;
use opsgrid_core::{ActorContext, AppError, AppResult, TenantId};
use opsgrid_domain::{ActionType, AuditAction, AuditOutcome, FeatureArea, Permission};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AuditEmitter, AuditEvent, AuthorizationService};

/// Payload keys the server always owns; client-supplied values are dropped.
const RESERVED_PAYLOAD_KEYS: &[&str] = &["id", "tenant_id"];

/// A tenant-owned business record (client, deal, invoice, project).
///
/// The tenant identifier is set at creation and immutable for the record's
/// whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRecord {
    /// Stable record identifier.
    pub record_id: Uuid,
    /// Owning tenant; never mutated after creation.
    pub tenant_id: TenantId,
    /// Business area the record belongs to.
    pub kind: FeatureArea,
    /// Record payload.
    pub data: Value,
    /// Subject that created the record.
    pub created_by: String,
    /// Creation timestamp in RFC3339.
    pub created_at: String,
    /// Last update timestamp in RFC3339.
    pub updated_at: String,
}

/// Query inputs for record listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordListQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

/// Replacement payload for record updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// New record payload.
    pub data: Value,
}

/// Repository port for tenant-owned record persistence.
///
/// Every operation takes the tenant identifier and must filter by it; a
/// record under another tenant is unreachable, not access-denied.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Inserts a record under the given tenant.
    async fn create_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        data: Value,
        created_by: &str,
    ) -> AppResult<BusinessRecord>;

    /// Finds a record in tenant scope.
    async fn find_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<Option<BusinessRecord>>;

    /// Lists records of one kind in tenant scope, newest first.
    async fn list_records(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        query: RecordListQuery,
    ) -> AppResult<Vec<BusinessRecord>>;

    /// Replaces a record payload in tenant scope. Returns `None` when no row
    /// matched the tenant-filtered lookup.
    async fn update_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
        data: Value,
    ) -> AppResult<Option<BusinessRecord>>;

    /// Deletes a record in tenant scope. Returns whether a row was removed.
    async fn delete_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<bool>;
}

/// Application service enforcing the tenant-scoping discipline for business
/// records. Callers never pass a tenant identifier; it is always derived
/// from the authenticated actor context.
#[derive(Clone)]
pub struct RecordService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn RecordRepository>,
    audit_emitter: AuditEmitter,
}

impl RecordService {
    /// Creates a new record service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn RecordRepository>,
        audit_emitter: AuditEmitter,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            audit_emitter,
        }
    }

    /// Creates a record under the actor's tenant.
    pub async fn create_record(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        data: Value,
    ) -> AppResult<BusinessRecord> {
        self.require(actor, kind, ActionType::Create).await?;

        let record = self
            .repository
            .create_record(
                actor.tenant_id(),
                kind,
                strip_reserved_keys(data),
                actor.subject(),
            )
            .await?;

        self.record_event(
            actor,
            AuditAction::RecordCreated,
            kind,
            record.record_id.to_string(),
        )
        .await;

        Ok(record)
    }

    /// Finds a record in the actor's tenant.
    pub async fn find_record(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<BusinessRecord> {
        self.require(actor, kind, ActionType::View).await?;

        self.repository
            .find_record(actor.tenant_id(), kind, record_id)
            .await?
            .ok_or_else(|| record_not_found(kind, record_id))
    }

    /// Lists records of one kind in the actor's tenant.
    pub async fn list_records(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        query: RecordListQuery,
    ) -> AppResult<Vec<BusinessRecord>> {
        self.require(actor, kind, ActionType::View).await?;
        self.repository
            .list_records(actor.tenant_id(), kind, query)
            .await
    }

    /// Replaces a record payload. The tenant identifier can never change.
    pub async fn update_record(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        record_id: Uuid,
        update: RecordUpdate,
    ) -> AppResult<BusinessRecord> {
        self.require(actor, kind, ActionType::Edit).await?;

        let record = self
            .repository
            .update_record(
                actor.tenant_id(),
                kind,
                record_id,
                strip_reserved_keys(update.data),
            )
            .await?
            .ok_or_else(|| record_not_found(kind, record_id))?;

        self.record_event(
            actor,
            AuditAction::RecordUpdated,
            kind,
            record.record_id.to_string(),
        )
        .await;

        Ok(record)
    }

    /// Deletes a record in the actor's tenant.
    pub async fn delete_record(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<()> {
        self.require(actor, kind, ActionType::Delete).await?;

        let removed = self
            .repository
            .delete_record(actor.tenant_id(), kind, record_id)
            .await?;

        if !removed {
            return Err(record_not_found(kind, record_id));
        }

        self.record_event(
            actor,
            AuditAction::RecordDeleted,
            kind,
            record_id.to_string(),
        )
        .await;

        Ok(())
    }

    /// Exports the tenant's full slice of one record kind. Sensitive data
    /// access: always audited.
    pub async fn export_records(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
    ) -> AppResult<Vec<BusinessRecord>> {
        self.require(actor, kind, ActionType::Export).await?;

        let records = self
            .repository
            .list_records(
                actor.tenant_id(),
                kind,
                RecordListQuery {
                    limit: usize::MAX,
                    offset: 0,
                },
            )
            .await?;

        self.audit_emitter
            .record(AuditEvent {
                tenant_id: actor.tenant_id(),
                actor: actor.subject().to_owned(),
                action: AuditAction::RecordExported,
                resource_type: "business_record".to_owned(),
                resource_id: kind.as_str().to_owned(),
                outcome: AuditOutcome::Success,
                metadata: json!({ "rows": records.len() }),
            })
            .await;

        Ok(records)
    }

    async fn require(
        &self,
        actor: &ActorContext,
        kind: FeatureArea,
        action: ActionType,
    ) -> AppResult<()> {
        if !kind.is_business_area() {
            return Err(AppError::Validation(format!(
                "'{}' is not a business record area",
                kind.as_str()
            )));
        }

        self.authorization_service
            .require_permission(
                actor.tenant_id(),
                actor.subject(),
                Permission::new(kind, action),
            )
            .await
    }

    async fn record_event(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        kind: FeatureArea,
        resource_id: String,
    ) {
        self.audit_emitter
            .record(AuditEvent {
                tenant_id: actor.tenant_id(),
                actor: actor.subject().to_owned(),
                action,
                resource_type: "business_record".to_owned(),
                resource_id,
                outcome: AuditOutcome::Success,
                metadata: json!({ "kind": kind.as_str() }),
            })
            .await;
    }
}

/// A missing record and a cross-tenant record are indistinguishable to the
/// caller. Never report Forbidden here.
fn record_not_found(kind: FeatureArea, record_id: Uuid) -> AppError {
    AppError::NotFound(format!("{} record '{record_id}' was not found", kind.as_str()))
}

fn strip_reserved_keys(data: Value) -> Value {
    match data {
        Value::Object(mut entries) => {
            for key in RESERVED_PAYLOAD_KEYS {
                entries.remove(*key);
            }
            Value::Object(entries)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use opsgrid_core::{ActorContext, AppError, AppResult, TenantId};
    use opsgrid_domain::{ActionType, DefaultRole, FeatureArea, Permission};
    use serde_json::{Value, json};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::{
        AuditEmitter, AuditEvent, AuditRepository, AuthorizationRepository, AuthorizationService,
        SubjectGrants,
    };

    use super::{
        BusinessRecord, RecordListQuery, RecordRepository, RecordService, RecordUpdate,
        strip_reserved_keys,
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

    #[derive(Default)]
    struct FakeRecordRepository {
        records: Mutex<Vec<BusinessRecord>>,
    }

    #[async_trait]
    impl RecordRepository for FakeRecordRepository {
        async fn create_record(
            &self,
            tenant_id: TenantId,
            kind: FeatureArea,
            data: Value,
            created_by: &str,
        ) -> AppResult<BusinessRecord> {
            let record = BusinessRecord {
                record_id: Uuid::new_v4(),
                tenant_id,
                kind,
                data,
                created_by: created_by.to_owned(),
                created_at: "2026-01-01T00:00:00Z".to_owned(),
                updated_at: "2026-01-01T00:00:00Z".to_owned(),
            };
            self.records.lock().await.push(record.clone());
            Ok(record)
        }

        async fn find_record(
            &self,
            tenant_id: TenantId,
            kind: FeatureArea,
            record_id: Uuid,
        ) -> AppResult<Option<BusinessRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .find(|record| {
                    record.tenant_id == tenant_id
                        && record.kind == kind
                        && record.record_id == record_id
                })
                .cloned())
        }

        async fn list_records(
            &self,
            tenant_id: TenantId,
            kind: FeatureArea,
            _query: RecordListQuery,
        ) -> AppResult<Vec<BusinessRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .filter(|record| record.tenant_id == tenant_id && record.kind == kind)
                .cloned()
                .collect())
        }

        async fn update_record(
            &self,
            tenant_id: TenantId,
            kind: FeatureArea,
            record_id: Uuid,
            data: Value,
        ) -> AppResult<Option<BusinessRecord>> {
            let mut records = self.records.lock().await;
            let record = records.iter_mut().find(|record| {
                record.tenant_id == tenant_id
                    && record.kind == kind
                    && record.record_id == record_id
            });

            Ok(record.map(|record| {
                record.data = data;
                record.clone()
            }))
        }

        async fn delete_record(
            &self,
            tenant_id: TenantId,
            kind: FeatureArea,
            record_id: Uuid,
        ) -> AppResult<bool> {
            let mut records = self.records.lock().await;
            let before = records.len();
            records.retain(|record| {
                !(record.tenant_id == tenant_id
                    && record.kind == kind
                    && record.record_id == record_id)
            });
            Ok(records.len() != before)
        }
    }

    fn service_for_tenants(
        members: &[(TenantId, &str)],
    ) -> (RecordService, Arc<FakeRecordRepository>, Arc<FakeAuditRepository>) {
        let grants = members
            .iter()
            .map(|(tenant_id, subject)| {
                (
                    (*tenant_id, (*subject).to_owned()),
                    SubjectGrants {
                        role_ids: vec![Uuid::new_v4()],
                        permissions: DefaultRole::Owner.permissions().into_iter().collect(),
                    },
                )
            })
            .collect();

        let audit_repository = Arc::new(FakeAuditRepository::default());
        let authorization_service = AuthorizationService::new(
            Arc::new(FakeAuthorizationRepository { grants }),
            AuditEmitter::new(Arc::new(FakeAuditRepository::default())),
        );
        let repository = Arc::new(FakeRecordRepository::default());
        let service = RecordService::new(
            authorization_service,
            repository.clone(),
            AuditEmitter::new(audit_repository.clone()),
        );
        (service, repository, audit_repository)
    }

    #[tokio::test]
    async fn tenant_isolation_holds_in_both_directions() {
        let tenant_one = TenantId::new();
        let tenant_two = TenantId::new();
        let (service, _, _) = service_for_tenants(&[(tenant_one, "u1"), (tenant_two, "u2")]);
        let actor_one = ActorContext::new("u1", tenant_one);
        let actor_two = ActorContext::new("u2", tenant_two);

        let Ok(record) = service
            .create_record(&actor_one, FeatureArea::Clients, json!({"name": "Acme"}))
            .await
        else {
            panic!("record creation failed");
        };

        // Tenant two sees NotFound for find, update, and delete.
        let result = service
            .find_record(&actor_two, FeatureArea::Clients, record.record_id)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = service
            .update_record(
                &actor_two,
                FeatureArea::Clients,
                record.record_id,
                RecordUpdate {
                    data: json!({"name": "Hijacked"}),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = service
            .delete_record(&actor_two, FeatureArea::Clients, record.record_id)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // The original record is unchanged after the cross-tenant attempts.
        let Ok(unchanged) = service
            .find_record(&actor_one, FeatureArea::Clients, record.record_id)
            .await
        else {
            panic!("owner lookup failed");
        };
        assert_eq!(unchanged.data, json!({"name": "Acme"}));
    }

    #[tokio::test]
    async fn creation_derives_tenant_from_actor_and_strips_client_tenant() {
        let tenant_id = TenantId::new();
        let (service, repository, _) = service_for_tenants(&[(tenant_id, "u1")]);
        let actor = ActorContext::new("u1", tenant_id);

        let forged_tenant = TenantId::new();
        let Ok(record) = service
            .create_record(
                &actor,
                FeatureArea::Deals,
                json!({"tenant_id": forged_tenant.to_string(), "amount": 100}),
            )
            .await
        else {
            panic!("record creation failed");
        };

        assert_eq!(record.tenant_id, tenant_id);
        assert_eq!(record.data, json!({"amount": 100}));

        let records = repository.records.lock().await;
        assert_eq!(records[0].tenant_id, tenant_id);
    }

    #[tokio::test]
    async fn updates_cannot_touch_the_tenant_field() {
        let tenant_id = TenantId::new();
        let (service, repository, _) = service_for_tenants(&[(tenant_id, "u1")]);
        let actor = ActorContext::new("u1", tenant_id);

        let Ok(record) = service
            .create_record(&actor, FeatureArea::Projects, json!({"title": "Alpha"}))
            .await
        else {
            panic!("record creation failed");
        };

        let result = service
            .update_record(
                &actor,
                FeatureArea::Projects,
                record.record_id,
                RecordUpdate {
                    data: json!({"title": "Beta", "tenant_id": TenantId::new().to_string()}),
                },
            )
            .await;
        assert!(result.is_ok());

        let records = repository.records.lock().await;
        assert_eq!(records[0].tenant_id, tenant_id);
        assert_eq!(records[0].data, json!({"title": "Beta"}));
    }

    #[tokio::test]
    async fn non_business_area_is_rejected() {
        let tenant_id = TenantId::new();
        let (service, _, _) = service_for_tenants(&[(tenant_id, "u1")]);
        let actor = ActorContext::new("u1", tenant_id);

        let result = service
            .create_record(&actor, FeatureArea::Roles, json!({}))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn export_requires_the_export_grant_and_is_audited() {
        let tenant_id = TenantId::new();
        let (service, _, audit_repository) = service_for_tenants(&[(tenant_id, "u1")]);
        let owner = ActorContext::new("u1", tenant_id);

        assert!(service
            .create_record(&owner, FeatureArea::Invoices, json!({"total": 5}))
            .await
            .is_ok());

        let Ok(exported) = service.export_records(&owner, FeatureArea::Invoices).await else {
            panic!("export failed");
        };
        assert_eq!(exported.len(), 1);

        let events = audit_repository.events.lock().await;
        assert!(events.iter().any(|event| {
            event.action == opsgrid_domain::AuditAction::RecordExported
                && event.resource_id == "invoices"
        }));
    }

    #[tokio::test]
    async fn viewer_grants_do_not_allow_edits() {
        let tenant_id = TenantId::new();
        let audit_repository = Arc::new(FakeAuditRepository::default());
        let authorization_service = AuthorizationService::new(
            Arc::new(FakeAuthorizationRepository {
                grants: HashMap::from([(
                    (tenant_id, "v1".to_owned()),
                    SubjectGrants {
                        role_ids: vec![Uuid::new_v4()],
                        permissions: DefaultRole::Viewer.permissions().into_iter().collect(),
                    },
                )]),
            }),
            AuditEmitter::new(Arc::new(FakeAuditRepository::default())),
        );
        let service = RecordService::new(
            authorization_service,
            Arc::new(FakeRecordRepository::default()),
            AuditEmitter::new(audit_repository),
        );
        let viewer = ActorContext::new("v1", tenant_id);

        let result = service
            .update_record(
                &viewer,
                FeatureArea::Clients,
                Uuid::new_v4(),
                RecordUpdate { data: json!({}) },
            )
            .await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn reserved_keys_are_stripped_from_objects_only() {
        let stripped = strip_reserved_keys(json!({"id": 1, "tenant_id": "x", "name": "ok"}));
        assert_eq!(stripped, json!({"name": "ok"}));

        let passthrough = strip_reserved_keys(json!([1, 2]));
        assert_eq!(passthrough, json!([1, 2]));
    }
}
