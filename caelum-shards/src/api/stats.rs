//! Aggregate counter endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, Method},
    routing::{get, post},
    Json, Router,
};
use caelum_common::ApiResponse;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{Counter, Stats};
use crate::AppState;

pub const SECRET_HEADER: &str = "x-caelum-secret";

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Stats>>> {
    Ok(Json(ApiResponse::success(state.counters.snapshot().await?)))
}

/// POST /api/stats/rebuild
///
/// Recomputes whispers (record count) and shards (records minted or carrying
/// a txHash) from the store. pofActions has no source of truth and is kept.
pub async fn rebuild_stats(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Stats>>> {
    let records = state.store.list().await?;
    let whispers = records.len() as u64;
    let shards = records
        .iter()
        .filter(|r| r.is_minted() || r.tx_hash.as_deref().is_some_and(|h| !h.is_empty()))
        .count() as u64;

    let current = state.counters.snapshot().await?;
    let stats = state
        .counters
        .overwrite(shards, whispers, current.pof_actions)
        .await?;

    info!(shards, whispers, "Stats rebuilt from store");
    Ok(Json(ApiResponse::success(stats)))
}

/// POST /api/stats/record-shard
///
/// Cross-origin webhook called when a shard is minted elsewhere.
pub async fn record_shard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Stats>>> {
    if let Some(expected) = state.stats_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("record-shard called with missing or wrong secret");
            return Err(ApiError::Unauthorized("Unauthorized".to_string()));
        }
    }

    let stats = state.counters.increment(Counter::Shards).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Open CORS for the webhook, including private-network preflights
fn webhook_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SECRET_HEADER)])
        .allow_private_network(true)
}

pub fn stats_routes() -> Router<AppState> {
    let webhook = Router::new()
        .route("/api/stats/record-shard", post(record_shard))
        .layer(webhook_cors());

    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/stats/rebuild", post(rebuild_stats))
        .merge(webhook)
}
