//! Feedback endpoint

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use caelum_common::ApiResponse;
use serde::Deserialize;
use tracing::warn;

use super::non_blank;
use crate::error::{ApiError, ApiResult};
use crate::models::{Counter, ReflectionRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub id: Option<String>,
    pub value: Option<i32>,
}

/// POST /api/feedback
///
/// Adds `value` (+1 or -1) to the record's running feedback total.
pub async fn submit_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ReflectionRecord>>> {
    let Json(req) = payload?;
    let id = non_blank(req.id).ok_or_else(|| ApiError::BadRequest("Missing id".to_string()))?;
    let value = match req.value {
        Some(v @ (-1 | 1)) => v,
        _ => return Err(ApiError::BadRequest("value must be 1 or -1".to_string())),
    };

    let updated = state
        .store
        .modify(&id, &move |record: &mut ReflectionRecord| {
            record.feedback = Some(record.feedback.unwrap_or(0).saturating_add(value));
            Ok(())
        })
        .await?;

    if let Err(e) = state.counters.increment(Counter::PofActions).await {
        warn!(error = %e, "Failed to count feedback");
    }

    Ok(Json(ApiResponse::success(updated)))
}

pub fn feedback_routes() -> Router<AppState> {
    Router::new().route("/api/feedback", post(submit_feedback))
}
