//! Durable "mint submitted" marker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Written before a relay call and removed once the record is finalized
/// (or the relay definitely did not receive the request).
///
/// A claim that outlives its cycle means the relay may have committed a mint
/// that was never recorded locally; the record stays out of selection until
/// an operator verifies on chain and releases it.
///
/// A claim with a `reason` parks a record that can never be minted as it
/// stands (no usable wallet). The relay was never called for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintClaim {
    pub reflection_id: String,
    pub content_id: String,
    pub claimed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MintClaim {
    pub fn new(reflection_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            reflection_id: reflection_id.into(),
            content_id: content_id.into(),
            claimed_at: Utc::now(),
            reason: None,
        }
    }

    /// Claim that holds an unmintable record out of selection
    pub fn parked(
        reflection_id: impl Into<String>,
        content_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(reflection_id, content_id)
        }
    }

    pub fn is_parked(&self) -> bool {
        self.reason.is_some()
    }
}
