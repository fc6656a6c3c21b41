use opsgrid_application::{
    AuditQueryService, RecordService, RoleAdminService, TenantService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub role_admin_service: RoleAdminService,
    pub record_service: RecordService,
    pub audit_query_service: AuditQueryService,
    pub tenant_service: TenantService,
    pub frontend_url: String,
    pub bootstrap_token: String,
}
