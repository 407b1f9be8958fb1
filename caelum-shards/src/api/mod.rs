//! HTTP API handlers for caelum-shards
//!
//! All endpoints answer with the `ApiResponse` envelope.

pub mod feedback;
pub mod health;
pub mod mint;
pub mod queue;
pub mod stats;
pub mod status;
pub mod whispers;

pub use feedback::feedback_routes;
pub use health::health_routes;
pub use mint::mint_routes;
pub use queue::queue_routes;
pub use stats::stats_routes;
pub use status::status_routes;
pub use whispers::whisper_routes;

/// Field value unless missing or whitespace-only
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
