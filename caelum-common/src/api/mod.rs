//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY framework-independent types. Each service wraps
//! them with its own axum extractors and `IntoResponse` impls.

pub mod types;

pub use types::ApiResponse;
