//! # Caelum Common Library
//!
//! Shared code for the Caelum shard services:
//! - Error and result types
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Event types (ShardEvent) and the broadcast EventBus
//! - The JSON response envelope used by every HTTP endpoint
//! - Id and timestamp helpers

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod time;

pub use api::ApiResponse;
pub use error::{Error, Result};
pub use events::{EventBus, ShardEvent};
