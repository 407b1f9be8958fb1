//! Integration tests for the caelum-shards HTTP API
//!
//! The router runs against an in-memory SQLite database; the mint relay is a
//! wiremock server.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use caelum_common::EventBus;
use caelum_shards::db::{self, SqliteCounterStore, SqliteReflectionStore};
use caelum_shards::mint::intent::{Eip712Domain, DEFAULT_GATEWAY_BASE};
use caelum_shards::mint::{MintBatchProcessor, MintIntentBuilder, MintRelayClient, RelayConfig, RelayMode};
use caelum_shards::models::ReflectionPatch;
use caelum_shards::store::ReflectionStore;
use caelum_shards::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WALLET: &str = "0x4444444444444444444444444444444444444444";

struct TestApp {
    router: Router,
    store: Arc<SqliteReflectionStore>,
}

async fn setup(relay: Option<&MockServer>, stats_secret: Option<&str>) -> TestApp {
    let pool = db::init_in_memory_pool().await.unwrap();
    let store = Arc::new(SqliteReflectionStore::new(pool.clone()));
    let counters = Arc::new(SqliteCounterStore::new(pool));
    let event_bus = EventBus::new(16);

    let relay = relay.map(|server| {
        MintRelayClient::new(RelayConfig {
            endpoint: format!("{}/mint", server.uri()),
            token: None,
            mode: RelayMode::Simple,
        })
        .unwrap()
    });
    let builder = MintIntentBuilder::new(
        Eip712Domain::new("0x1111111111111111111111111111111111111111".parse().unwrap()),
        DEFAULT_GATEWAY_BASE,
    );
    let processor = Arc::new(MintBatchProcessor::new(
        store.clone(),
        relay,
        builder,
        event_bus.clone(),
    ));

    let state = AppState::new(store.clone(), counters, processor, event_bus)
        .with_stats_secret(stats_secret.map(str::to_string));

    TestApp {
        router: build_router(state),
        store,
    }
}

async fn relay_replying(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mint"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

async fn whisper(app: &TestApp, text: &str, user: &str) -> String {
    let (status, body) = send(app, post_json("/api/whisper", json!({"text": text, "user": user}))).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn enqueue(app: &TestApp, id: &str) {
    let (status, _) = send(app, post_json("/api/queue/enqueue", json!({"id": id, "queued": true}))).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_whisper_queue_mint_end_to_end() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"txHash": "0xdeadbeef"})))
        .expect(1)
        .mount(&relay)
        .await;
    let app = setup(Some(&relay), None).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/whisper",
            json!({"text": "I feel hopeful about tomorrow", "user": "0xABC"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let record = &body["data"];
    let id = record["id"].as_str().unwrap().to_string();
    assert_eq!(record["prompt"], "I feel hopeful about tomorrow");
    assert_eq!(record["meta"]["user"], "0xABC");
    assert_eq!(record["meta"]["version"], "whispers.v1");
    let confidence = record["confidence"].as_f64().unwrap();
    assert!((0.5..0.9).contains(&confidence));

    let (status, body) = send(&app, post_json("/api/queue/enqueue", json!({"id": id, "queued": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["queued"], true);

    let (_, body) = send(&app, get("/api/queue/list?view=queued")).await;
    let queued = body["data"].as_array().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0]["id"], id.as_str());

    let (status, body) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": id, "txHash": "0xdeadbeef"}));

    let (_, body) = send(&app, get("/api/queue/list")).await;
    let minted = &body["data"][0];
    assert_eq!(minted["minted"], true);
    assert_eq!(minted["txHash"], "0xdeadbeef");
    assert_eq!(minted["contentRef"], id.as_str());
    assert!(minted["mintedAt"].is_string());

    let (_, body) = send(&app, get("/api/stats")).await;
    assert_eq!(body["data"]["whispers"], 1);
    // Batch mints are counted by the record-shard webhook, not here
    assert_eq!(body["data"]["shards"], 0);
}

#[tokio::test]
async fn test_relay_receives_simple_body() {
    let relay = MockServer::start().await;
    let app = setup(Some(&relay), None).await;
    let id = whisper(&app, "a thought", "0xABC").await;
    enqueue(&app, &id).await;

    Mock::given(method("POST"))
        .and(body_json(json!({"txId": id, "address": "0xABC"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"txHash": "0x01"})))
        .expect(1)
        .mount(&relay)
        .await;

    let (status, _) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Whisper / reflect validation
// =============================================================================

#[tokio::test]
async fn test_whisper_requires_text_and_user() {
    let app = setup(None, None).await;

    for body in [json!({"text": "hi"}), json!({"user": "0xABC"}), json!({"text": "  ", "user": "u"})] {
        let (status, body) = send(&app, post_json("/api/whisper", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["data"], Value::Null);
        assert!(body["error"].is_string());
    }

    assert!(app.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup(None, None).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/whisper")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_reflect_defaults_user_and_skips_counter() {
    let app = setup(None, None).await;

    let (status, body) = send(&app, post_json("/api/reflect", json!({"prompt": "quiet"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["user"], "anon");
    assert_eq!(body["data"]["prompt"], "quiet");

    let (status, _) = send(&app, post_json("/api/reflect", json!({"user": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stats) = send(&app, get("/api/stats")).await;
    assert_eq!(stats["data"]["whispers"], 0);
}

// =============================================================================
// Feedback
// =============================================================================

#[tokio::test]
async fn test_feedback_accumulates_and_counts() {
    let app = setup(None, None).await;
    let id = whisper(&app, "feedback me", "u").await;

    send(&app, post_json("/api/feedback", json!({"id": id, "value": 1}))).await;
    let (status, body) = send(&app, post_json("/api/feedback", json!({"id": id, "value": 1}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["feedback"], 2);

    let (_, stats) = send(&app, get("/api/stats")).await;
    assert_eq!(stats["data"]["pofActions"], 2);
}

#[tokio::test]
async fn test_feedback_validation() {
    let app = setup(None, None).await;
    let id = whisper(&app, "x", "u").await;

    let (status, _) = send(&app, post_json("/api/feedback", json!({"id": id, "value": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post_json("/api/feedback", json!({"value": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, post_json("/api/feedback", json!({"id": "nope", "value": -1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);
}

// =============================================================================
// Queue
// =============================================================================

#[tokio::test]
async fn test_enqueue_errors() {
    let app = setup(None, None).await;

    let (status, _) = send(&app, post_json("/api/queue/enqueue", json!({"id": "ghost", "queued": true}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_json("/api/queue/enqueue", json!({"id": "ghost"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = whisper(&app, "x", "u").await;
    app.store
        .update(&id, &ReflectionPatch::minted("0xabc", id.clone(), chrono::Utc::now()))
        .await
        .unwrap();
    let (status, _) = send(&app, post_json("/api/queue/enqueue", json!({"id": id, "queued": false}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_orders_newest_first_and_rejects_unknown_view() {
    let app = setup(None, None).await;
    let first = whisper(&app, "one", "u").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = whisper(&app, "two", "u").await;

    let (_, body) = send(&app, get("/api/queue/list")).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let (status, _) = send(&app, get("/api/queue/list?view=everything")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Mint
// =============================================================================

#[tokio::test]
async fn test_mint_with_empty_queue_returns_null() {
    let relay = MockServer::start().await;
    let app = setup(Some(&relay), None).await;
    whisper(&app, "not queued", "u").await;

    let (status, body) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"], Value::Null);
    assert!(relay.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mint_without_relay_is_500() {
    let app = setup(None, None).await;
    let id = whisper(&app, "x", "u").await;
    enqueue(&app, &id).await;

    let (status, body) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_relay_failure_is_502_and_record_unchanged() {
    let relay = relay_replying(500, json!({"error": "chain congested"})).await;
    let app = setup(Some(&relay), None).await;
    let id = whisper(&app, "x", "u").await;
    enqueue(&app, &id).await;
    let before = app.store.load(&id).await.unwrap();

    let (status, body) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
    assert_eq!(body["detail"]["status"], 500);
    assert!(body["detail"]["body"].as_str().unwrap().contains("chain congested"));

    let after = app.store.load(&id).await.unwrap();
    assert_eq!(after, before);
    assert!(after.minted.is_none());

    let (_, pending) = send(&app, get("/api/mint/pending")).await;
    assert_eq!(pending["data"], json!([]));
}

#[tokio::test]
async fn test_ambiguous_relay_reply_is_held_until_released() {
    let relay = relay_replying(200, json!({"status": "queued"})).await;
    let app = setup(Some(&relay), None).await;
    let id = whisper(&app, "x", "u").await;
    enqueue(&app, &id).await;

    let (status, _) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, pending) = send(&app, get("/api/mint/pending")).await;
    assert_eq!(pending["data"][0]["reflectionId"], id.as_str());

    // Held record is not picked again
    let (status, body) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    let (status, _) = send(&app, post_json("/api/mint/pending/release", json!({"id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, post_json("/api/mint/pending/release", json!({"id": id}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unqueue_during_mint_is_conflict() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mint"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"txHash": "0xabc"}))
                .set_delay(std::time::Duration::from_millis(400)),
        )
        .mount(&relay)
        .await;
    let app = setup(Some(&relay), None).await;
    let id = whisper(&app, "slow mint", "0xABC").await;
    enqueue(&app, &id).await;

    let router = app.router.clone();
    let mint = tokio::spawn(async move { router.oneshot(post_empty("/api/mint-from-queue")).await });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (status, body) = send(&app, post_json("/api/queue/enqueue", json!({"id": id, "queued": false}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);

    let response = mint.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = app.store.load(&id).await.unwrap();
    assert_eq!(record.minted, Some(true));
    assert_eq!(record.queued, Some(true));
}

#[tokio::test]
async fn test_unqueue_held_record_is_conflict_until_released() {
    let relay = relay_replying(200, json!({"status": "queued"})).await;
    let app = setup(Some(&relay), None).await;
    let id = whisper(&app, "x", "u").await;
    enqueue(&app, &id).await;

    let (status, _) = send(&app, post_empty("/api/mint-from-queue")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send(&app, post_json("/api/queue/enqueue", json!({"id": id, "queued": false}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, post_json("/api/mint/pending/release", json!({"id": id}))).await;
    let (status, body) = send(&app, post_json("/api/queue/enqueue", json!({"id": id, "queued": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["queued"], false);
}

#[tokio::test]
async fn test_build_intent() {
    let app = setup(None, None).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/mint/intent/build",
            json!({"user": WALLET, "contentId": "ar-1", "nonce": "12345678901234567890123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["typedData"]["primaryType"], "MintIntent");
    assert_eq!(data["typedData"]["message"]["nonce"], "12345678901234567890123");
    assert_eq!(data["typedData"]["message"]["uri"], "https://gateway.irys.xyz/ar-1");
    let digest = data["digest"].as_str().unwrap();
    assert!(digest.starts_with("0x"));
    assert_eq!(digest.len(), 66);

    let (status, _) = send(
        &app,
        post_json("/api/mint/intent/build", json!({"user": "0xABC", "contentId": "ar-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_relay_intent_round_trip_and_expiry() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"txHash": "0xabc"})))
        .expect(1)
        .mount(&relay)
        .await;
    let app = setup(Some(&relay), None).await;

    let (_, built) = send(
        &app,
        post_json("/api/mint/intent/build", json!({"user": WALLET, "contentId": "ar-2"})),
    )
    .await;
    let message = built["data"]["typedData"]["message"].clone();

    let (status, body) = send(
        &app,
        post_json("/api/mint/intent", json!({"value": message, "signature": "0xsigned"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["txHash"], "0xabc");

    let mut expired = message.clone();
    expired["deadline"] = json!(1);
    let (status, _) = send(
        &app,
        post_json("/api/mint/intent", json!({"value": expired, "signature": "0xsigned"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post_json("/api/mint/intent", json!({"value": message}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Stats
// =============================================================================

#[tokio::test]
async fn test_record_shard_requires_secret() {
    let app = setup(None, Some("hook-secret")).await;

    let (status, body) = send(&app, post_empty("/api/stats/record-shard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let request = Request::builder()
        .method("POST")
        .uri("/api/stats/record-shard")
        .header("x-caelum-secret", "hook-secret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["shards"], 1);
}

#[tokio::test]
async fn test_record_shard_open_without_secret() {
    let app = setup(None, None).await;
    let (status, body) = send(&app, post_empty("/api/stats/record-shard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["shards"], 1);
}

#[tokio::test]
async fn test_record_shard_preflight() {
    let app = setup(None, Some("s")).await;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/stats/record-shard")
        .header("origin", "http://192.168.1.5:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-caelum-secret")
        .header("access-control-request-private-network", "true")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-private-network"], "true");
}

#[tokio::test]
async fn test_rebuild_recomputes_from_store() {
    let app = setup(None, None).await;
    let a = whisper(&app, "a", "u").await;
    whisper(&app, "b", "u").await;
    app.store
        .update(&a, &ReflectionPatch::minted("0x1", a.clone(), chrono::Utc::now()))
        .await
        .unwrap();
    send(&app, post_json("/api/feedback", json!({"id": a, "value": -1}))).await;
    send(&app, post_empty("/api/stats/record-shard")).await;
    send(&app, post_empty("/api/stats/record-shard")).await;

    let (status, body) = send(&app, post_empty("/api/stats/rebuild")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["whispers"], 2);
    assert_eq!(body["data"]["shards"], 1);
    assert_eq!(body["data"]["pofActions"], 1);
}

// =============================================================================
// Status / health
// =============================================================================

#[tokio::test]
async fn test_status_summary() {
    let app = setup(None, None).await;
    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(whisper(&app, &format!("whisper {}", i), "u").await);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let (status, body) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total"], 7);
    assert_eq!(data["pendingMints"], 0);
    let by_emotion: u64 = data["byEmotion"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(by_emotion, 7);
    let recent = data["recent"].as_array().unwrap();
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0]["id"], ids[6].as_str());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup(None, None).await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "caelum-shards");
    assert!(body["version"].is_string());
    assert!(body["uptimeSeconds"].is_u64());
}
