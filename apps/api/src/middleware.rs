use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use opsgrid_core::{ActorContext, AppError};
use tower_sessions::Session;

use crate::auth::SESSION_ACTOR_KEY;
use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the authenticated subject in trusted-header deployments.
pub const SUBJECT_HEADER: &str = "x-opsgrid-subject";

/// Requires a session-stored actor context (session auth strategy).
pub async fn require_session_identity(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = session
        .get::<ActorContext>(SESSION_ACTOR_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .ok_or(AppError::AuthRequired)?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Resolves the actor context from the subject header set by an
/// authenticating proxy (trusted-header auth strategy). The header is only
/// trustworthy when the proxy strips client-supplied copies.
pub async fn require_trusted_header_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let subject = request
        .headers()
        .get(SUBJECT_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let actor = state.tenant_service.actor_context(subject.as_str()).await?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        let headers = request.headers();

        if let Some(fetch_site) = headers.get("sec-fetch-site") {
            if fetch_site == HeaderValue::from_static("cross-site") {
                return Err(AppError::AuthRequired.into());
            }
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let referer = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let allowed_origin = state.frontend_url;
        let origin_is_allowed = origin == allowed_origin;
        let referer_is_allowed = referer.starts_with(&allowed_origin);

        if !origin_is_allowed && !referer_is_allowed {
            return Err(AppError::AuthRequired.into());
        }
    }

    Ok(next.run(request).await)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
