use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use opsgrid_core::AppError;

use crate::dto::{ProvisionTenantRequest, ProvisionTenantResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Provisions a named tenant. Operator surface, gated by the deployment's
/// bootstrap token rather than a tenant-scoped permission.
pub async fn provision_tenant_handler(
    State(state): State<AppState>,
    Json(payload): Json<ProvisionTenantRequest>,
) -> ApiResult<(StatusCode, Json<ProvisionTenantResponse>)> {
    if payload.bootstrap_token != state.bootstrap_token {
        return Err(AppError::AuthRequired.into());
    }

    let tenant_id = state
        .tenant_service
        .provision(payload.name.as_str(), payload.owner_subject.as_str())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProvisionTenantResponse {
            tenant_id: tenant_id.to_string(),
        }),
    ))
}
