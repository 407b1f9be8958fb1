//! Whisper ingestion endpoints

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use caelum_common::{ApiResponse, ShardEvent};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::non_blank;
use crate::error::{ApiError, ApiResult};
use crate::models::{Counter, ReflectionRecord};
use crate::AppState;

/// Default user for the lightweight reflect endpoint
const ANONYMOUS_USER: &str = "anon";

#[derive(Debug, Deserialize)]
pub struct WhisperRequest {
    pub text: Option<String>,
    pub user: Option<String>,
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReflectRequest {
    pub prompt: Option<String>,
    pub text: Option<String>,
    pub user: Option<String>,
    pub context: Option<Value>,
}

/// POST /api/whisper
///
/// Generates, stores and announces a reflection, and bumps the whispers counter.
pub async fn submit_whisper(
    State(state): State<AppState>,
    payload: Result<Json<WhisperRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ReflectionRecord>>> {
    let Json(req) = payload?;
    let (Some(text), Some(user)) = (non_blank(req.text), non_blank(req.user)) else {
        return Err(ApiError::BadRequest("Missing { user, text }".to_string()));
    };

    let record = state.engine.generate(&text, &user, req.context.as_ref());
    state.store.save(&record).await?;
    info!(id = %record.id, emotion = %record.emotion, "Whisper reflected");

    state.event_bus.emit_lossy(ShardEvent::ReflectionCreated {
        id: record.id.clone(),
        user: record.meta.user.clone(),
        emotion: record.emotion.to_string(),
        reflection: record.reflection.clone(),
        confidence: record.confidence,
        shard_intent: record.shard_intent,
        timestamp: record.timestamp,
    });

    // The record is already stored; a counter hiccup must not fail the request
    if let Err(e) = state.counters.increment(Counter::Whispers).await {
        warn!(error = %e, "Failed to count whisper");
    }

    Ok(Json(ApiResponse::success(record)))
}

/// POST /api/reflect
///
/// Store-only variant: no counter, no notification, user optional.
pub async fn reflect(
    State(state): State<AppState>,
    payload: Result<Json<ReflectRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ReflectionRecord>>> {
    let Json(req) = payload?;
    let Some(text) = non_blank(req.prompt).or(non_blank(req.text)) else {
        return Err(ApiError::BadRequest("Missing prompt/text".to_string()));
    };
    let user = non_blank(req.user).unwrap_or_else(|| ANONYMOUS_USER.to_string());

    let record = state.engine.generate(&text, &user, req.context.as_ref());
    state.store.save(&record).await?;

    Ok(Json(ApiResponse::success(record)))
}

pub fn whisper_routes() -> Router<AppState> {
    Router::new()
        .route("/api/whisper", post(submit_whisper))
        .route("/api/reflect", post(reflect))
}
