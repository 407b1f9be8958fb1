//! Aggregate counters record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{shards, whispers, pofActions, updatedAt}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub shards: u64,
    pub whispers: u64,
    pub pof_actions: u64,
    pub updated_at: DateTime<Utc>,
}

impl Stats {
    pub fn zero() -> Self {
        Self {
            shards: 0,
            whispers: 0,
            pof_actions: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Individually incrementable counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Shards,
    Whispers,
    PofActions,
}

impl Counter {
    /// Column in the `counters` table
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Shards => "shards",
            Counter::Whispers => "whispers",
            Counter::PofActions => "pof_actions",
        }
    }
}
