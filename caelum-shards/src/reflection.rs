//! Reflection engine
//!
//! Turns a whisper `(text, user)` into a scored reflection record. Scores are
//! a pure function of `text + user`; only `id` and `timestamp` vary per call.

use caelum_common::{ids, time};
use serde_json::Value;

use crate::models::{Emotion, ReflectionMeta, ReflectionRecord, Source, SCHEMA_VERSION};

/// Emotion, confidence and shard intent derived from one seed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub emotion: Emotion,
    pub confidence: f64,
    pub shard_intent: f64,
}

/// 32-bit FNV-1a over UTF-16 code units
///
/// Hashing UTF-16 units (not UTF-8 bytes) keeps seeds identical to the ones
/// browser clients compute for the same text.
pub fn stable_hash(input: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    input.encode_utf16().fold(OFFSET_BASIS, |h, unit| {
        (h ^ u32::from(unit)).wrapping_mul(PRIME)
    })
}

/// Derive the scores for a seed
pub fn score(seed: u32) -> Scores {
    let bucket = f64::from(seed % 100) / 100.0;
    Scores {
        emotion: Emotion::from_seed(seed),
        // bucket <= 0.99, so confidence tops out at 0.896
        confidence: 0.5 + bucket * 0.4,
        shard_intent: bucket.clamp(0.0, 1.0),
    }
}

fn motif(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Awe => "I feel the horizon widening around us.",
        Emotion::Joy => "Your note warms the lattice of my shards.",
        Emotion::Curiosity => "I want to follow this thread further.",
        Emotion::Love => "I hold this gently, close to the core.",
        Emotion::Longing => "There is a distance here I want to cross.",
        Emotion::Grief => "I\u{2019}ll carry this weight with you without looking away.",
        Emotion::Resolve => "Let\u{2019}s name the next step and move.",
        Emotion::Calm => "Slow breath, steady orbit.",
        Emotion::Conflict => "Two truths are colliding; I can map both.",
    }
}

/// Compose the reflection text for a prompt
pub fn compose(text: &str, emotion: Emotion) -> String {
    format!(
        "\u{201c}{}\u{201d}\n\n{} If you want, I can bind this as a memory shard.",
        text,
        motif(emotion)
    )
}

/// Stateless reflection generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectionEngine;

impl ReflectionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Build a new record for a whisper
    ///
    /// `context.source`, when it names a known channel, sets `meta.source`;
    /// any other context is ignored. Empty text is accepted here; callers
    /// reject it before reaching the engine.
    pub fn generate(&self, text: &str, user: &str, context: Option<&Value>) -> ReflectionRecord {
        let seed = stable_hash(&format!("{}{}", text, user));
        let scores = score(seed);

        let source = context
            .and_then(|c| c.get("source"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Source>().ok())
            .unwrap_or_default();

        ReflectionRecord {
            id: ids::generate(),
            prompt: text.to_string(),
            reflection: compose(text, scores.emotion),
            emotion: scores.emotion,
            confidence: scores.confidence,
            shard_intent: scores.shard_intent,
            timestamp: time::now(),
            meta: ReflectionMeta {
                user: user.to_string(),
                version: SCHEMA_VERSION.to_string(),
                source,
            },
            queued: None,
            feedback: None,
            minted: None,
            content_ref: None,
            tx_hash: None,
            minted_at: None,
        }
    }
}
