//! Mint queue endpoints

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use caelum_common::{time, ApiResponse, ShardEvent};
use serde::Deserialize;

use super::non_blank;
use crate::error::{ApiError, ApiResult};
use crate::models::ReflectionRecord;
use crate::queue::{QueueSelector, View};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub id: Option<String>,
    pub queued: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub view: View,
}

/// POST /api/queue/enqueue
///
/// 409 once minted or while a mint claim is outstanding.
pub async fn set_queued(
    State(state): State<AppState>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ReflectionRecord>>> {
    let Json(req) = payload?;
    let (Some(id), Some(queued)) = (non_blank(req.id), req.queued) else {
        return Err(ApiError::BadRequest("Missing { id, queued }".to_string()));
    };

    let updated = state.processor.set_queued(&id, queued).await?;

    state.event_bus.emit_lossy(ShardEvent::QueueToggled {
        id: updated.id.clone(),
        queued,
        timestamp: time::now(),
    });

    Ok(Json(ApiResponse::success(updated)))
}

/// GET /api/queue/list?view=all|queued|candidates
///
/// Newest first.
pub async fn list_queue(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<ReflectionRecord>>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let records = state.store.list().await?;
    Ok(Json(ApiResponse::success(QueueSelector::view(records, query.view))))
}

pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/api/queue/enqueue", post(set_queued))
        .route("/api/queue/list", get(list_queue))
}
