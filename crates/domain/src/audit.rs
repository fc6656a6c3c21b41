use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted for every authorization decision, allow or deny.
    AuthorizationDecided,
    /// Emitted when a custom role is created.
    SecurityRoleCreated,
    /// Emitted when a role is updated.
    SecurityRoleUpdated,
    /// Emitted when a role is deleted.
    SecurityRoleDeleted,
    /// Emitted when a role is assigned to a subject.
    SecurityRoleAssigned,
    /// Emitted when a role is revoked from a subject.
    SecurityRoleRevoked,
    /// Emitted when a business record is created.
    RecordCreated,
    /// Emitted when a business record is updated.
    RecordUpdated,
    /// Emitted when a business record is deleted.
    RecordDeleted,
    /// Emitted when a tenant's records are exported in bulk.
    RecordExported,
    /// Emitted when a tenant is provisioned with its default roles.
    TenantProvisioned,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationDecided => "authz.decided",
            Self::SecurityRoleCreated => "security.role.created",
            Self::SecurityRoleUpdated => "security.role.updated",
            Self::SecurityRoleDeleted => "security.role.deleted",
            Self::SecurityRoleAssigned => "security.role.assigned",
            Self::SecurityRoleRevoked => "security.role.revoked",
            Self::RecordCreated => "record.created",
            Self::RecordUpdated => "record.updated",
            Self::RecordDeleted => "record.deleted",
            Self::RecordExported => "record.exported",
            Self::TenantProvisioned => "tenant.provisioned",
        }
    }
}

/// Outcome of the audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Authorization decision permitted the operation.
    Allow,
    /// Authorization decision rejected the operation.
    Deny,
    /// Guarded business operation completed.
    Success,
    /// Guarded business operation failed after being allowed.
    Failure,
    /// The decision procedure itself failed; access was denied closed.
    Error,
}

impl AuditOutcome {
    /// Returns a stable storage value for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}
