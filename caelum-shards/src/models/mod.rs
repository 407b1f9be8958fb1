//! Data models for caelum-shards

pub mod claim;
pub mod reflection;
pub mod stats;

pub use claim::MintClaim;
pub use reflection::{
    Emotion, MetaPatch, ReflectionMeta, ReflectionPatch, ReflectionRecord, Source,
    SCHEMA_VERSION,
};
pub use stats::{Counter, Stats};
