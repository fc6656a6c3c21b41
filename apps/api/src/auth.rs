use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use opsgrid_core::{ActorContext, AppError};
use serde::Deserialize;
use tower_sessions::Session;

use crate::dto::ActorResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Session key holding the resolved actor context.
pub const SESSION_ACTOR_KEY: &str = "opsgrid.actor";

#[derive(Debug, Deserialize)]
pub struct AssumeIdentityRequest {
    pub bootstrap_token: String,
    pub subject: String,
}

/// Installs an externally-authenticated identity into the session.
///
/// Identity proofing happens outside this service; this endpoint is the
/// hand-off point and is gated by the deployment's bootstrap token.
pub async fn assume_identity_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AssumeIdentityRequest>,
) -> ApiResult<Json<ActorResponse>> {
    if payload.bootstrap_token != state.bootstrap_token {
        return Err(AppError::AuthRequired.into());
    }

    let actor = state
        .tenant_service
        .actor_context(payload.subject.as_str())
        .await?;

    session
        .insert(SESSION_ACTOR_KEY, actor.clone())
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    Ok(Json(ActorResponse::from(actor)))
}

pub async fn me_handler(
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<ActorResponse>> {
    Ok(Json(ActorResponse::from(actor)))
}

pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .flush()
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}
