//! Store overview endpoint

use axum::{extract::State, routing::get, Json, Router};
use caelum_common::ApiResponse;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiResult;
use crate::models::ReflectionRecord;
use crate::queue::QueueSelector;
use crate::AppState;

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total: usize,
    pub by_emotion: BTreeMap<String, usize>,
    /// Newest first
    pub recent: Vec<ReflectionRecord>,
    pub pending_mints: usize,
}

/// GET /api/status
pub async fn get_status(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<StatusResponse>>> {
    let mut records = state.store.list().await?;
    let pending_mints = state.store.mint_claims().await?.len();

    let mut by_emotion = BTreeMap::new();
    for record in &records {
        *by_emotion.entry(record.emotion.to_string()).or_insert(0) += 1;
    }

    QueueSelector::sort_newest_first(&mut records);
    let total = records.len();
    records.truncate(RECENT_LIMIT);

    Ok(Json(ApiResponse::success(StatusResponse {
        total,
        by_emotion,
        recent: records,
        pending_mints,
    })))
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/api/status", get(get_status))
}
