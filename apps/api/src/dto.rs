use opsgrid_application::{AuditLogEntry, BusinessRecord, RoleAssignment, RoleDefinition};
use opsgrid_core::ActorContext;
use opsgrid_domain::Permission;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ActorResponse {
    pub subject: String,
    pub tenant_id: String,
}

impl From<ActorContext> for ActorResponse {
    fn from(value: ActorContext) -> Self {
        Self {
            subject: value.subject().to_owned(),
            tenant_id: value.tenant_id().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub permissions: Vec<String>,
}

impl From<RoleDefinition> for RoleResponse {
    fn from(value: RoleDefinition) -> Self {
        Self {
            role_id: value.role_id,
            name: value.name,
            description: value.description,
            is_default: value.is_default,
            permissions: value
                .permissions
                .iter()
                .map(Permission::storage_value)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub subject: String,
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRoleAssignmentRequest {
    pub subject: String,
    pub role_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub subject: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub granted_by: String,
    pub granted_at: String,
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(value: RoleAssignment) -> Self {
        Self {
            subject: value.subject,
            role_id: value.role_id,
            role_name: value.role_name,
            granted_by: value.granted_by,
            granted_at: value.granted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogEntryResponse {
    pub event_id: String,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub outcome: String,
    pub metadata: Value,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            event_id: value.event_id,
            actor: value.actor,
            action: value.action,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            outcome: value.outcome,
            metadata: value.metadata,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub record_id: Uuid,
    pub kind: String,
    pub data: Value,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BusinessRecord> for RecordResponse {
    fn from(value: BusinessRecord) -> Self {
        Self {
            record_id: value.record_id,
            kind: value.kind.as_str().to_owned(),
            data: value.data,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordPayloadRequest {
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionTenantRequest {
    pub bootstrap_token: String,
    pub name: String,
    pub owner_subject: String,
}

#[derive(Debug, Serialize)]
pub struct ProvisionTenantResponse {
    pub tenant_id: String,
}

/// Parses transport permission strings, rejecting the batch on the first
/// malformed value.
pub fn parse_permissions(values: &[String]) -> Result<Vec<Permission>, ApiError> {
    values
        .iter()
        .map(|value| Permission::from_transport(value.as_str()).map_err(ApiError::from))
        .collect()
}
