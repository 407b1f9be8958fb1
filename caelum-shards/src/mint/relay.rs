//! Mint relay HTTP client
//!
//! One JSON POST per mint. No retries and no client-side timeout; the
//! caller decides what a failure means for the record.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::intent::MintIntent;

const USER_AGENT: &str = concat!("caelum-shards/", env!("CARGO_PKG_VERSION"));

/// Request body shape the relay expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayMode {
    /// `{txId, address}`
    #[default]
    Simple,
    /// `{txId, address, value, signature}`
    Sig,
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "simple" => Ok(RelayMode::Simple),
            "sig" | "signature" => Ok(RelayMode::Sig),
            other => Err(format!("unknown relay mode '{}' (expected simple or sig)", other)),
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Simple => f.write_str("simple"),
            RelayMode::Sig => f.write_str("sig"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub mode: RelayMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayPayload {
    Simple {
        #[serde(rename = "txId")]
        tx_id: String,
        address: String,
    },
    Signed {
        #[serde(rename = "txId")]
        tx_id: String,
        address: String,
        value: MintIntent,
        signature: String,
    },
}

impl RelayPayload {
    pub fn tx_id(&self) -> &str {
        match self {
            RelayPayload::Simple { tx_id, .. } | RelayPayload::Signed { tx_id, .. } => tx_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReceipt {
    pub tx_hash: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelayFailure {
    #[error("Mint relayer error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Mint relayer unreachable: {message}")]
    Transport { message: String, request_sent: bool },

    #[error("Mint relayer returned {status} without a txHash")]
    MalformedResponse { status: u16, body: String },
}

impl RelayFailure {
    /// The relay may have acted on the request even though we saw a failure
    pub fn may_have_committed(&self) -> bool {
        match self {
            RelayFailure::Status { .. } => false,
            RelayFailure::Transport { request_sent, .. } => *request_sent,
            RelayFailure::MalformedResponse { .. } => true,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RelayFailure::Status { status, .. } | RelayFailure::MalformedResponse { status, .. } => {
                Some(*status)
            }
            RelayFailure::Transport { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            RelayFailure::Status { body, .. } | RelayFailure::MalformedResponse { body, .. } => {
                Some(body)
            }
            RelayFailure::Transport { .. } => None,
        }
    }
}

pub struct MintRelayClient {
    http_client: reqwest::Client,
    config: RelayConfig,
}

impl MintRelayClient {
    pub fn new(config: RelayConfig) -> caelum_common::Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(caelum_common::Error::Config(
                "relay endpoint is empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| caelum_common::Error::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn mode(&self) -> RelayMode {
        self.config.mode
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub async fn relay(&self, payload: &RelayPayload) -> Result<RelayReceipt, RelayFailure> {
        tracing::debug!(
            endpoint = %self.config.endpoint,
            tx_id = payload.tx_id(),
            mode = %self.config.mode,
            "Relaying mint"
        );

        let mut request = self.http_client.post(&self.config.endpoint).json(payload);
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| RelayFailure::Transport {
            message: e.to_string(),
            // Connect and builder errors happen before any byte reaches the relay
            request_sent: !(e.is_connect() || e.is_builder()),
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(RelayFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tx_hash = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("txHash").and_then(Value::as_str).map(str::to_string))
            .filter(|h| !h.trim().is_empty());

        match tx_hash {
            Some(tx_hash) => {
                tracing::info!(tx_id = payload.tx_id(), tx_hash = %tx_hash, "Relay accepted mint");
                Ok(RelayReceipt { tx_hash })
            }
            None => Err(RelayFailure::MalformedResponse {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
