//! Raw response passthrough.
//!
//! Enabled with the `raw-mode` feature.

/// Decoded body of a successful Data API call, untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse(pub serde_json::Value);

impl RawResponse {
    /// The `response` object of the body.
    pub fn response(&self) -> Option<&serde_json::Value> {
        self.0.get("response")
    }
}
