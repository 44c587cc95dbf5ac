use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::headers::Headers;

/// Upstream body chunks; a transport failure mid-stream is delivered in-band.
pub type ByteStream = tokio::sync::mpsc::Receiver<Result<Bytes, UpstreamFailure>>;

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub body: UpstreamBody,
}

impl UpstreamHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single streaming `POST` to an upstream provider.
#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub url: String,
    pub headers: Headers,
    pub body: Bytes,
    /// Bounds the wait for response headers; the body stream is governed by
    /// the client's idle timeout instead.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// Transport-level failures (no HTTP response, or the body broke off).
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// HTTP error response captured as bytes (non-2xx).
    Http { status: u16, body: Bytes },
}

impl UpstreamFailure {
    pub fn transport(kind: UpstreamTransportErrorKind, message: impl Into<String>) -> Self {
        UpstreamFailure::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            UpstreamFailure::Transport {
                kind: UpstreamTransportErrorKind::Timeout | UpstreamTransportErrorKind::ReadTimeout,
                ..
            }
        )
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFailure::Transport { kind, message } => {
                write!(f, "transport error ({kind:?}): {message}")
            }
            UpstreamFailure::Http { status, body } => {
                write!(f, "http {status}: {}", String::from_utf8_lossy(body))
            }
        }
    }
}

impl std::error::Error for UpstreamFailure {}
