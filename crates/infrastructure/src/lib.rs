//! Storage adapters for application ports.

#![forbid(unsafe_code)]

mod audit_retention;
mod in_memory_audit_store;
mod in_memory_record_repository;
mod in_memory_security_store;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod postgres_record_repository;
mod postgres_role_admin_repository;
mod postgres_tenant_directory;

pub use audit_retention::purge_expired_audit_events;
pub use in_memory_audit_store::InMemoryAuditStore;
pub use in_memory_record_repository::InMemoryRecordRepository;
pub use in_memory_security_store::InMemorySecurityStore;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_record_repository::PostgresRecordRepository;
pub use postgres_role_admin_repository::PostgresRoleAdminRepository;
pub use postgres_tenant_directory::PostgresTenantDirectory;
