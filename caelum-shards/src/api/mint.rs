//! Mint endpoints: batch cycle, typed-data intents, pending claims

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use caelum_common::{time, ApiResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::non_blank;
use crate::error::{ApiError, ApiResult};
use crate::mint::intent::to_hex;
use crate::mint::{MintIntent, MintOutcome, RelayReceipt};
use crate::models::MintClaim;
use crate::AppState;

/// POST /api/mint-from-queue
///
/// Runs one batch cycle. `data: null` when nothing is queued.
pub async fn mint_from_queue(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<MintOutcome>>> {
    match state.processor.run_once().await? {
        Some(outcome) => Ok(Json(ApiResponse::success(outcome))),
        None => {
            info!("Mint requested but queue is empty");
            Ok(Json(ApiResponse::empty()))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NonceInput {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIntentRequest {
    pub user: Option<String>,
    pub content_id: Option<String>,
    pub uri: Option<String>,
    pub nonce: Option<NonceInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltIntent {
    pub typed_data: Value,
    pub digest: String,
}

/// POST /api/mint/intent/build
///
/// Returns the `eth_signTypedData_v4` document and digest for a client-side signer.
pub async fn build_intent(
    State(state): State<AppState>,
    payload: Result<Json<BuildIntentRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<BuiltIntent>>> {
    let Json(req) = payload?;
    let (Some(user), Some(content_id)) = (non_blank(req.user), non_blank(req.content_id)) else {
        return Err(ApiError::BadRequest("Missing { user, contentId }".to_string()));
    };
    let nonce = match req.nonce {
        Some(NonceInput::Text(s)) => s
            .trim()
            .parse::<u128>()
            .map_err(|_| ApiError::BadRequest(format!("invalid nonce '{}'", s)))?,
        Some(NonceInput::Number(n)) => u128::from(n),
        None => state.processor.nonces().next(),
    };

    let builder = state.processor.builder();
    let intent = builder.build(&user, &content_id, req.uri.as_deref(), nonce, time::now())?;

    Ok(Json(ApiResponse::success(BuiltIntent {
        typed_data: builder.typed_data(&intent),
        digest: to_hex(&builder.digest(&intent)),
    })))
}

#[derive(Debug, Deserialize)]
pub struct RelayIntentRequest {
    pub value: MintIntent,
    pub signature: Option<String>,
}

/// POST /api/mint/intent
///
/// Relays an intent signed by the user's wallet. Records are not touched.
pub async fn relay_intent(
    State(state): State<AppState>,
    payload: Result<Json<RelayIntentRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<RelayReceipt>>> {
    let Json(req) = payload?;
    let signature = non_blank(req.signature)
        .ok_or_else(|| ApiError::BadRequest("Missing signature".to_string()))?;

    let receipt = state.processor.relay_signed(req.value, signature).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

/// GET /api/mint/pending
///
/// Claims whose relay outcome is unknown; verify on chain before releasing.
pub async fn pending_mints(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<MintClaim>>>> {
    Ok(Json(ApiResponse::success(state.store.mint_claims().await?)))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub id: Option<String>,
}

/// POST /api/mint/pending/release
pub async fn release_pending(
    State(state): State<AppState>,
    payload: Result<Json<ReleaseRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let Json(req) = payload?;
    let id = non_blank(req.id).ok_or_else(|| ApiError::BadRequest("Missing id".to_string()))?;

    if !state.store.release_mint(&id).await? {
        return Err(ApiError::NotFound(format!("No mint claim for {}", id)));
    }
    info!(id = %id, "Mint claim released by operator");
    Ok(Json(ApiResponse::success(serde_json::json!({ "id": id }))))
}

pub fn mint_routes() -> Router<AppState> {
    Router::new()
        .route("/api/mint-from-queue", post(mint_from_queue))
        .route("/api/mint/intent/build", post(build_intent))
        .route("/api/mint/intent", post(relay_intent))
        .route("/api/mint/pending", get(pending_mints))
        .route("/api/mint/pending/release", post(release_pending))
}
