//! Opsgrid API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod auth;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use opsgrid_application::{
    AuditEmitter, AuditQueryService, AuthorizationService, RecordService, RoleAdminService,
    TenantService,
};
use opsgrid_core::AppError;
use opsgrid_infrastructure::{
    PostgresAuditLogRepository, PostgresAuditRepository, PostgresAuthorizationRepository,
    PostgresRecordRepository, PostgresRoleAdminRepository, PostgresTenantDirectory,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use crate::api_config::{ApiConfig, AuthStrategy};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let app_state = build_state(pool.clone(), &config);

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/internal/tenants",
            post(handlers::tenants::provision_tenant_handler),
        );

    // The auth strategy is fixed at startup; the assembled router is the only
    // place that knows which one is active.
    let app = match config.auth_strategy {
        AuthStrategy::Session => {
            let session_store = PostgresStore::new(pool.clone())
                .with_table_name("tower_sessions")
                .map_err(|error| {
                    AppError::Validation(format!(
                        "invalid session table name configuration: {error}"
                    ))
                })?;
            session_store.migrate().await.map_err(|error| {
                AppError::Internal(format!("failed to initialize session store: {error}"))
            })?;

            let session_layer = SessionManagerLayer::new(session_store)
                .with_secure(config.cookie_secure)
                .with_same_site(SameSite::Lax)
                .with_http_only(true)
                .with_expiry(Expiry::OnInactivity(Duration::minutes(30)));

            let protected = protected_routes().route_layer(from_fn(
                middleware::require_session_identity,
            ));

            public_routes
                .route("/auth/assume", post(auth::assume_identity_handler))
                .route("/auth/logout", post(auth::logout_handler))
                .merge(protected)
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    middleware::require_same_origin_for_mutations,
                ))
                .layer(session_layer)
        }
        AuthStrategy::TrustedHeader => {
            let protected = protected_routes().route_layer(from_fn_with_state(
                app_state.clone(),
                middleware::require_trusted_header_identity,
            ));

            public_routes.merge(protected)
        }
    }
    .layer(TraceLayer::new_for_http())
    .layer(cors_layer)
    .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "opsgrid-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/api/security/permissions",
            get(handlers::security::list_permissions_handler),
        )
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}",
            axum::routing::put(handlers::security::update_role_handler)
                .delete(handlers::security::delete_role_handler),
        )
        .route(
            "/api/security/role-assignments",
            get(handlers::security::list_role_assignments_handler)
                .post(handlers::security::assign_role_handler),
        )
        .route(
            "/api/security/role-unassignments",
            post(handlers::security::unassign_role_handler),
        )
        .route(
            "/api/security/subjects/{subject}/roles",
            get(handlers::security::subject_roles_handler),
        )
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route(
            "/api/records/{kind}",
            get(handlers::records::list_records_handler)
                .post(handlers::records::create_record_handler),
        )
        .route(
            "/api/records/{kind}/export",
            get(handlers::records::export_records_handler),
        )
        .route(
            "/api/records/{kind}/{record_id}",
            get(handlers::records::get_record_handler)
                .put(handlers::records::update_record_handler)
                .delete(handlers::records::delete_record_handler),
        )
}

fn build_state(pool: PgPool, config: &ApiConfig) -> AppState {
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let audit_emitter = AuditEmitter::new(audit_repository);

    let authorization_repository = Arc::new(PostgresAuthorizationRepository::new(pool.clone()));
    let authorization_service =
        AuthorizationService::new(authorization_repository, audit_emitter.clone());

    let role_admin_repository = Arc::new(PostgresRoleAdminRepository::new(pool.clone()));
    let role_admin_service = RoleAdminService::new(
        authorization_service.clone(),
        role_admin_repository,
        audit_emitter.clone(),
    );

    let record_repository = Arc::new(PostgresRecordRepository::new(pool.clone()));
    let record_service = RecordService::new(
        authorization_service.clone(),
        record_repository,
        audit_emitter.clone(),
    );

    let audit_log_repository = Arc::new(PostgresAuditLogRepository::new(pool.clone()));
    let audit_query_service =
        AuditQueryService::new(authorization_service, audit_log_repository);

    let tenant_directory = Arc::new(PostgresTenantDirectory::new(pool));
    let tenant_service = TenantService::new(tenant_directory, audit_emitter);

    AppState {
        role_admin_service,
        record_service,
        audit_query_service,
        tenant_service,
        frontend_url: config.frontend_url.clone(),
        bootstrap_token: config.bootstrap_token.clone(),
    }
}
