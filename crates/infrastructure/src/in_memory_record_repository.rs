use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use opsgrid_application::{BusinessRecord, RecordListQuery, RecordRepository};
use opsgrid_core::{AppResult, TenantId};
use opsgrid_domain::FeatureArea;

/// In-memory record repository for local development and tests.
#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<Vec<BusinessRecord>>,
}

impl InMemoryRecordRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn create_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        data: serde_json::Value,
        created_by: &str,
    ) -> AppResult<BusinessRecord> {
        let now = now_rfc3339();
        let record = BusinessRecord {
            record_id: Uuid::new_v4(),
            tenant_id,
            kind,
            data,
            created_by: created_by.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.records.write().await.push(record.clone());
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
            .read()
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
        query: RecordListQuery,
    ) -> AppResult<Vec<BusinessRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<BusinessRecord> = records
            .iter()
            .filter(|record| record.tenant_id == tenant_id && record.kind == kind)
            .cloned()
            .collect();
        matching.reverse();

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn update_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
        data: serde_json::Value,
    ) -> AppResult<Option<BusinessRecord>> {
        let mut records = self.records.write().await;
        let record = records.iter_mut().find(|record| {
            record.tenant_id == tenant_id && record.kind == kind && record.record_id == record_id
        });

        Ok(record.map(|record| {
            record.data = data;
            record.updated_at = now_rfc3339();
            record.clone()
        }))
    }

    async fn delete_record(
        &self,
        tenant_id: TenantId,
        kind: FeatureArea,
        record_id: Uuid,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| {
            !(record.tenant_id == tenant_id
                && record.kind == kind
                && record.record_id == record_id)
        });

        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use opsgrid_application::{RecordListQuery, RecordRepository};
    use opsgrid_core::TenantId;
    use opsgrid_domain::FeatureArea;
    use serde_json::json;

    use super::InMemoryRecordRepository;

    #[tokio::test]
    async fn records_are_invisible_outside_their_tenant() {
        let repository = InMemoryRecordRepository::new();
        let tenant_one = TenantId::new();
        let tenant_two = TenantId::new();

        let Ok(record) = repository
            .create_record(tenant_one, FeatureArea::Clients, json!({"name": "Acme"}), "alice")
            .await
        else {
            panic!("creation failed");
        };

        let Ok(found) = repository
            .find_record(tenant_two, FeatureArea::Clients, record.record_id)
            .await
        else {
            panic!("lookup failed");
        };
        assert!(found.is_none());

        let Ok(deleted) = repository
            .delete_record(tenant_two, FeatureArea::Clients, record.record_id)
            .await
        else {
            panic!("delete failed");
        };
        assert!(!deleted);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paginated() {
        let repository = InMemoryRecordRepository::new();
        let tenant_id = TenantId::new();

        for index in 0..3 {
            let created = repository
                .create_record(
                    tenant_id,
                    FeatureArea::Deals,
                    json!({"index": index}),
                    "alice",
                )
                .await;
            assert!(created.is_ok());
        }

        let Ok(page) = repository
            .list_records(
                tenant_id,
                FeatureArea::Deals,
                RecordListQuery { limit: 2, offset: 0 },
            )
            .await
        else {
            panic!("listing failed");
        };

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].data, json!({"index": 2}));
        assert_eq!(page[1].data, json!({"index": 1}));
    }
}
