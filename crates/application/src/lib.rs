//! Application services and ports.

#![forbid(unsafe_code)]

mod audit;
mod authorization_service;
mod record_service;
mod role_admin_service;
mod tenant_service;

pub use audit::{
    AuditEmitter, AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditQueryService,
    AuditRepository, redact_metadata,
};
pub use authorization_service::{
    AccessDecision, AuthorizationRepository, AuthorizationService, DenyReason, SubjectGrants,
};
pub use record_service::{
    BusinessRecord, RecordListQuery, RecordRepository, RecordService, RecordUpdate,
};
pub use role_admin_service::{
    CreateRoleInput, RoleAdminRepository, RoleAdminService, RoleAssignment, RoleDefinition,
    UpdateRoleInput,
};
pub use tenant_service::{TenantDirectory, TenantService};
