//! Shared API request/response types
//!
//! Every endpoint answers with the same envelope:
//! `{ "ok": bool, "data": T | null, "error"?: string, "detail"?: object }`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON response envelope
///
/// `data` is always serialized (as `null` when absent) so that clients can
/// tell "no result" apart from a missing field.
///
/// # Examples
///
/// ```
/// use caelum_common::api::ApiResponse;
///
/// let ok = ApiResponse::success(42);
/// assert!(ok.ok);
///
/// let empty: ApiResponse<u32> = ApiResponse::empty();
/// assert_eq!(serde_json::to_value(&empty).unwrap()["data"], serde_json::Value::Null);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extra diagnostics, e.g. upstream status and body on relay failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            detail: None,
        }
    }

    /// Successful response with `data: null`
    pub fn empty() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
            detail: None,
        }
    }

    /// Failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            detail: None,
        }
    }

    /// Attach diagnostics
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}
