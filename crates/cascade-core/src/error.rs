use bytes::Bytes;
use http::StatusCode;
use serde_json::json;

use cascade_protocol::openai::error::ErrorEnvelope;

/// A pre-stream failure, answered with a plain JSON body.
#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProxyError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::envelope(StatusCode::BAD_REQUEST, message, "invalid_request_error")
    }

    /// Validation failures carry every broken rule under `details`.
    pub fn validation(details: Vec<String>) -> Self {
        let body = json!({
            "error": "Invalid request",
            "details": details,
        });
        Self {
            status: StatusCode::BAD_REQUEST,
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::envelope(StatusCode::INTERNAL_SERVER_ERROR, message, "server_error")
    }

    fn envelope(status: StatusCode, message: impl Into<String>, kind: &str) -> Self {
        let body = serde_json::to_vec(&ErrorEnvelope::new(message, kind)).unwrap_or_default();
        Self {
            status,
            body: Bytes::from(body),
        }
    }
}

/// The downstream client went away; nothing more can be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientGone;

impl std::fmt::Display for ClientGone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("client disconnected")
    }
}

impl std::error::Error for ClientGone {}
