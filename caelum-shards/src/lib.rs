//! caelum-shards library
//!
//! Turns whispers into scored reflections, keeps the mint queue, and relays
//! replay-protected mint intents for queued reflections.

use axum::Router;
use caelum_common::EventBus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod mint;
pub mod models;
pub mod notify;
pub mod queue;
pub mod reflection;
pub mod store;

pub use error::{ApiError, ApiResult};

use mint::MintBatchProcessor;
use reflection::ReflectionEngine;
use store::{CounterStore, ReflectionStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReflectionStore>,
    pub counters: Arc<dyn CounterStore>,
    pub engine: ReflectionEngine,
    pub processor: Arc<MintBatchProcessor>,
    /// Expected `x-caelum-secret` on the record-shard webhook; `None` disables the check
    pub stats_secret: Option<String>,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReflectionStore>,
        counters: Arc<dyn CounterStore>,
        processor: Arc<MintBatchProcessor>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            counters,
            engine: ReflectionEngine::new(),
            processor,
            stats_secret: None,
            event_bus,
            startup_time: Utc::now(),
        }
    }

    pub fn with_stats_secret(mut self, secret: Option<String>) -> Self {
        self.stats_secret = secret;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::whisper_routes())
        .merge(api::feedback_routes())
        .merge(api::queue_routes())
        .merge(api::mint_routes())
        .merge(api::stats_routes())
        .merge(api::status_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
