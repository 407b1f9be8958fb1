//! Best-effort webhook notifications
//!
//! Listens on the event bus and posts Discord-style webhooks for new
//! reflections and minted shards. A failed post is logged and dropped; it
//! never reaches the request that produced the event.

use caelum_common::{EventBus, ShardEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const WEBHOOK_USERNAME: &str = "Caelum";

/// Upper bound on one webhook post; events are handled one at a time
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub reflection_webhook: Option<String>,
    pub mint_webhook: Option<String>,
}

impl NotifierConfig {
    pub fn is_empty(&self) -> bool {
        self.reflection_webhook.is_none() && self.mint_webhook.is_none()
    }
}

pub struct Notifier {
    http_client: reqwest::Client,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> caelum_common::Result<Self> {
        Self::with_timeout(config, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(config: NotifierConfig, timeout: Duration) -> caelum_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| caelum_common::Error::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Consume events until the bus closes
    pub fn spawn(self, events: &EventBus) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notifier lagged behind event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Notifier stopped");
        })
    }

    pub async fn handle(&self, event: &ShardEvent) {
        let (url, body) = match event {
            ShardEvent::ReflectionCreated {
                user,
                emotion,
                reflection,
                confidence,
                shard_intent,
                timestamp,
                ..
            } => (
                self.config.reflection_webhook.as_deref(),
                reflection_embed(reflection, emotion, user, *confidence, *shard_intent, *timestamp),
            ),
            ShardEvent::ShardMinted { id, tx_hash, .. } => {
                (self.config.mint_webhook.as_deref(), mint_message(id, tx_hash))
            }
            _ => return,
        };

        if let Some(url) = url {
            self.post(url, &body, event.event_type()).await;
        }
    }

    async fn post(&self, url: &str, body: &Value, event_type: &str) {
        match self.http_client.post(url).json(body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(event_type, "Webhook delivered");
            }
            Ok(response) => {
                warn!(event_type, status = response.status().as_u16(), "Webhook rejected");
            }
            Err(e) => {
                warn!(event_type, error = %e, "Webhook post failed");
            }
        }
    }
}

fn percent(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Discord embed announcing a new reflection
pub fn reflection_embed(
    reflection: &str,
    emotion: &str,
    user: &str,
    confidence: f64,
    shard_intent: f64,
    timestamp: DateTime<Utc>,
) -> Value {
    json!({
        "username": WEBHOOK_USERNAME,
        "embeds": [{
            "title": "Reflection",
            "description": reflection,
            "fields": [
                {"name": "Emotion", "value": emotion, "inline": true},
                {"name": "Shard Intent", "value": format!("{}%", percent(shard_intent)), "inline": true},
                {"name": "User", "value": user, "inline": true},
            ],
            "footer": {
                "text": format!(
                    "confidence {}% \u{2022} {}",
                    percent(confidence),
                    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
                )
            },
        }],
    })
}

pub fn mint_message(id: &str, tx_hash: &str) -> Value {
    json!({
        "content": format!("\u{2705} Minted shard **{}** \u{2192} {}.", id, tx_hash),
    })
}
