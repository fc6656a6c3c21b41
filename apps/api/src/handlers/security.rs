use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use opsgrid_core::ActorContext;
use opsgrid_domain::Permission;
use uuid::Uuid;

use crate::dto::{
    AssignRoleRequest, AuditLogEntryResponse, CreateRoleRequest, RemoveRoleAssignmentRequest,
    RoleAssignmentResponse, RoleResponse, UpdateRoleRequest, parse_permissions,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<Vec<String>>> {
    let permissions = state
        .role_admin_service
        .list_permissions(&actor)
        .await?
        .iter()
        .map(Permission::storage_value)
        .collect();

    Ok(Json(permissions))
}

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_admin_service
        .list_roles(&actor)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let permissions = parse_permissions(&payload.permissions)?;

    let role = state
        .role_admin_service
        .create_role(
            &actor,
            opsgrid_application::CreateRoleInput {
                name: payload.name,
                description: payload.description,
                permissions,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let permissions = payload
        .permissions
        .as_deref()
        .map(parse_permissions)
        .transpose()?;

    let role = state
        .role_admin_service
        .update_role(
            &actor,
            role_id,
            opsgrid_application::UpdateRoleInput {
                name: payload.name,
                description: payload.description,
                permissions,
            },
        )
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.role_admin_service.delete_role(&actor, role_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .assign_role(&actor, payload.subject.as_str(), payload.role_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<RemoveRoleAssignmentRequest>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .revoke_role(&actor, payload.subject.as_str(), payload.role_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_role_assignments_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let assignments = state
        .role_admin_service
        .list_assignments(&actor)
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn subject_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(subject): Path<String>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_admin_service
        .roles_for_subject(&actor, subject.as_str())
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogQueryParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
    pub actor: Option<String>,
    pub resource_type: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<AuditLogQueryParams>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let entries = state
        .audit_query_service
        .list_audit_log(
            &actor,
            opsgrid_application::AuditLogQuery {
                limit: query.limit.unwrap_or(50),
                offset: query.offset.unwrap_or(0),
                action: query.action,
                actor: query.actor,
                resource_type: query.resource_type,
                created_after: query.created_after,
                created_before: query.created_before,
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
