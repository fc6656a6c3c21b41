use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use opsgrid_core::ActorContext;
use opsgrid_domain::FeatureArea;
use uuid::Uuid;

use crate::dto::{RecordPayloadRequest, RecordResponse};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct RecordListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_records_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(kind): Path<String>,
    Query(query): Query<RecordListParams>,
) -> ApiResult<Json<Vec<RecordResponse>>> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    let records = state
        .record_service
        .list_records(
            &actor,
            kind,
            opsgrid_application::RecordListQuery {
                limit: query.limit.unwrap_or(50),
                offset: query.offset.unwrap_or(0),
            },
        )
        .await?
        .into_iter()
        .map(RecordResponse::from)
        .collect();

    Ok(Json(records))
}

pub async fn create_record_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(kind): Path<String>,
    Json(payload): Json<RecordPayloadRequest>,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    let record = state
        .record_service
        .create_record(&actor, kind, payload.data)
        .await?;

    Ok((StatusCode::CREATED, Json(RecordResponse::from(record))))
}

pub async fn get_record_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((kind, record_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<RecordResponse>> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    let record = state
        .record_service
        .find_record(&actor, kind, record_id)
        .await?;

    Ok(Json(RecordResponse::from(record)))
}

pub async fn update_record_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((kind, record_id)): Path<(String, Uuid)>,
    Json(payload): Json<RecordPayloadRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    let record = state
        .record_service
        .update_record(
            &actor,
            kind,
            record_id,
            opsgrid_application::RecordUpdate { data: payload.data },
        )
        .await?;

    Ok(Json(RecordResponse::from(record)))
}

pub async fn delete_record_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((kind, record_id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    state
        .record_service
        .delete_record(&actor, kind, record_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_records_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<RecordResponse>>> {
    let kind = FeatureArea::from_str(kind.as_str())?;

    let records = state
        .record_service
        .export_records(&actor, kind)
        .await?
        .into_iter()
        .map(RecordResponse::from)
        .collect();

    Ok(Json(records))
}
