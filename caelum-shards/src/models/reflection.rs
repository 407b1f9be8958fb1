//! Reflection record and its partial-update patch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema version stamped into every new record's `meta.version`
pub const SCHEMA_VERSION: &str = "whispers.v1";

/// The nine fixed emotion tags, in selection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Awe,
    Joy,
    Curiosity,
    Love,
    Longing,
    Grief,
    Resolve,
    Calm,
    Conflict,
}

impl Emotion {
    /// Selection order; `seed % 9` indexes into this list
    pub const ALL: [Emotion; 9] = [
        Emotion::Awe,
        Emotion::Joy,
        Emotion::Curiosity,
        Emotion::Love,
        Emotion::Longing,
        Emotion::Grief,
        Emotion::Resolve,
        Emotion::Calm,
        Emotion::Conflict,
    ];

    pub fn from_seed(seed: u32) -> Self {
        Self::ALL[(seed % Self::ALL.len() as u32) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Awe => "awe",
            Emotion::Joy => "joy",
            Emotion::Curiosity => "curiosity",
            Emotion::Love => "love",
            Emotion::Longing => "longing",
            Emotion::Grief => "grief",
            Emotion::Resolve => "resolve",
            Emotion::Calm => "calm",
            Emotion::Conflict => "conflict",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel a whisper arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Web,
    Discord,
    System,
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Source::Web),
            "discord" => Ok(Source::Discord),
            "system" => Ok(Source::System),
            other => Err(format!("unknown source channel '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionMeta {
    /// Wallet address, handle or anonymous id
    pub user: String,
    pub version: String,
    pub source: Source,
}

/// One persisted reflection
///
/// `id` and `timestamp` never change after creation. The optional extension
/// fields are absent on a fresh record; absent `queued`/`minted` read as false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionRecord {
    pub id: String,
    pub prompt: String,
    pub reflection: String,
    pub emotion: Emotion,
    pub confidence: f64,
    pub shard_intent: f64,
    pub timestamp: DateTime<Utc>,
    pub meta: ReflectionMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted_at: Option<DateTime<Utc>>,
}

impl ReflectionRecord {
    pub fn is_queued(&self) -> bool {
        self.queued.unwrap_or(false)
    }

    pub fn is_minted(&self) -> bool {
        self.minted.unwrap_or(false)
    }

    /// Eligible for the batch mint pick
    pub fn is_pending(&self) -> bool {
        self.is_queued() && !self.is_minted()
    }

    /// Content id handed to the relay: stored content reference, else the record id
    pub fn content_id(&self) -> &str {
        match self.content_ref.as_deref() {
            Some(content_ref) if !content_ref.trim().is_empty() => content_ref,
            _ => &self.id,
        }
    }

    /// Checks the record-level invariants enforced on every write
    pub fn validate(&self) -> Result<(), String> {
        if !(0.5..0.9).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0.5,0.9)", self.confidence));
        }
        if !(0.0..=1.0).contains(&self.shard_intent) {
            return Err(format!("shardIntent {} outside [0,1]", self.shard_intent));
        }
        if self.is_minted() {
            let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
            if !present(&self.tx_hash) {
                return Err("minted record requires a txHash".to_string());
            }
            if !present(&self.content_ref) {
                return Err("minted record requires a contentRef".to_string());
            }
        }
        Ok(())
    }
}

/// Field-by-field patch for `meta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

/// Shallow partial update of a record
///
/// `None` means "keep the current value". `id` and `timestamp` are not
/// patchable. `meta` merges field by field instead of replacing wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_intent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted_at: Option<DateTime<Utc>>,
}

impl ReflectionPatch {
    pub fn queued(queued: bool) -> Self {
        Self {
            queued: Some(queued),
            ..Default::default()
        }
    }

    /// Finalization patch written after a successful relay
    pub fn minted(tx_hash: impl Into<String>, content_ref: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            minted: Some(true),
            tx_hash: Some(tx_hash.into()),
            content_ref: Some(content_ref.into()),
            minted_at: Some(at),
            ..Default::default()
        }
    }

    pub fn apply(&self, record: &mut ReflectionRecord) {
        if let Some(v) = &self.prompt {
            record.prompt = v.clone();
        }
        if let Some(v) = &self.reflection {
            record.reflection = v.clone();
        }
        if let Some(v) = self.emotion {
            record.emotion = v;
        }
        if let Some(v) = self.confidence {
            record.confidence = v;
        }
        if let Some(v) = self.shard_intent {
            record.shard_intent = v;
        }
        if let Some(meta) = &self.meta {
            if let Some(user) = &meta.user {
                record.meta.user = user.clone();
            }
            if let Some(version) = &meta.version {
                record.meta.version = version.clone();
            }
            if let Some(source) = meta.source {
                record.meta.source = source;
            }
        }
        if self.queued.is_some() {
            record.queued = self.queued;
        }
        if self.feedback.is_some() {
            record.feedback = self.feedback;
        }
        if self.minted.is_some() {
            record.minted = self.minted;
        }
        if self.content_ref.is_some() {
            record.content_ref = self.content_ref.clone();
        }
        if self.tx_hash.is_some() {
            record.tx_hash = self.tx_hash.clone();
        }
        if self.minted_at.is_some() {
            record.minted_at = self.minted_at;
        }
    }
}
