//! Record id generation
//!
//! Ids are UUIDv7 strings: time-ordered, globally unique, opaque to callers.

use uuid::Uuid;

/// Generate a new time-derived record id
pub fn generate() -> String {
    Uuid::now_v7().to_string()
}

/// Parse id from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}
