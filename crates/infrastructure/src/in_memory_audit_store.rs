use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use opsgrid_application::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
};
use opsgrid_core::{AppResult, TenantId};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
struct StoredEvent {
    event_id: Uuid,
    tenant_id: TenantId,
    event: AuditEvent,
    created_at: DateTime<Utc>,
}

/// In-memory audit sink and log for local development and tests.
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<StoredEvent>>,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events; test helper.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let stored = StoredEvent {
            event_id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            event,
            created_at: Utc::now(),
        };

        self.events.write().await.push(stored);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditStore {
    async fn list_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let limit = match query.limit {
            0 => DEFAULT_PAGE_SIZE,
            limit => limit.min(MAX_PAGE_SIZE),
        };

        let events = self.events.read().await;
        let mut matching: Vec<&StoredEvent> = events
            .iter()
            .filter(|stored| stored.tenant_id == tenant_id)
            .filter(|stored| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| stored.event.action.as_str() == action)
            })
            .filter(|stored| {
                query
                    .actor
                    .as_deref()
                    .is_none_or(|actor| stored.event.actor == actor)
            })
            .filter(|stored| {
                query
                    .resource_type
                    .as_deref()
                    .is_none_or(|resource_type| stored.event.resource_type == resource_type)
            })
            .filter(|stored| {
                query
                    .created_after
                    .is_none_or(|after| stored.created_at >= after)
            })
            .filter(|stored| {
                query
                    .created_before
                    .is_none_or(|before| stored.created_at < before)
            })
            .collect();

        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .map(|stored| AuditLogEntry {
                event_id: stored.event_id.to_string(),
                actor: stored.event.actor.clone(),
                action: stored.event.action.as_str().to_owned(),
                resource_type: stored.event.resource_type.clone(),
                resource_id: stored.event.resource_id.clone(),
                outcome: stored.event.outcome.as_str().to_owned(),
                metadata: stored.event.metadata.clone(),
                created_at: stored
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use opsgrid_application::{AuditEvent, AuditLogQuery, AuditLogRepository, AuditRepository};
    use opsgrid_core::TenantId;
    use opsgrid_domain::{AuditAction, AuditOutcome};
    use serde_json::json;

    use super::InMemoryAuditStore;

    fn event(tenant_id: TenantId, actor: &str, action: AuditAction) -> AuditEvent {
        AuditEvent {
            tenant_id,
            actor: actor.to_owned(),
            action,
            resource_type: "rbac_role".to_owned(),
            resource_id: "r1".to_owned(),
            outcome: AuditOutcome::Success,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn entries_are_tenant_scoped_and_newest_first() {
        let store = InMemoryAuditStore::new();
        let tenant_one = TenantId::new();
        let tenant_two = TenantId::new();

        for action in [
            AuditAction::SecurityRoleCreated,
            AuditAction::SecurityRoleAssigned,
        ] {
            assert!(store
                .append_event(event(tenant_one, "alice", action))
                .await
                .is_ok());
        }
        assert!(store
            .append_event(event(tenant_two, "bob", AuditAction::SecurityRoleCreated))
            .await
            .is_ok());

        let Ok(entries) = store
            .list_entries(tenant_one, AuditLogQuery::default())
            .await
        else {
            panic!("listing failed");
        };

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.actor == "alice"));
        assert!(entries[0].created_at >= entries[1].created_at);
    }

    #[tokio::test]
    async fn action_and_actor_filters_apply() {
        let store = InMemoryAuditStore::new();
        let tenant_id = TenantId::new();

        assert!(store
            .append_event(event(tenant_id, "alice", AuditAction::SecurityRoleCreated))
            .await
            .is_ok());
        assert!(store
            .append_event(event(tenant_id, "bob", AuditAction::SecurityRoleDeleted))
            .await
            .is_ok());

        let Ok(entries) = store
            .list_entries(
                tenant_id,
                AuditLogQuery {
                    action: Some("security.role.deleted".to_owned()),
                    ..AuditLogQuery::default()
                },
            )
            .await
        else {
            panic!("listing failed");
        };

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "bob");
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let store = InMemoryAuditStore::new();
        let tenant_id = TenantId::new();

        for _ in 0..3 {
            assert!(store
                .append_event(event(tenant_id, "alice", AuditAction::AuthorizationDecided))
                .await
                .is_ok());
        }

        let Ok(entries) = store
            .list_entries(
                tenant_id,
                AuditLogQuery {
                    limit: 2,
                    ..AuditLogQuery::default()
                },
            )
            .await
        else {
            panic!("listing failed");
        };
        assert_eq!(entries.len(), 2);
    }
}
