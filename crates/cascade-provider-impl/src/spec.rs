use std::fmt;
use std::time::Duration;

use serde_json::Value as JsonValue;

use cascade_provider_core::{ChatAdapter, ChatRequest};

use crate::kind::ProviderKind;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MAX_RETRIES_CAP: u32 = 10;

/// One configured upstream. Built once per registry snapshot and never
/// mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    /// Forced into every request sent to this provider.
    pub model: String,
    pub timeout: Duration,
    /// Attempts per client request, the first one included.
    pub max_retries: u32,
}

impl ProviderSpec {
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn shape_request(&self, request: &ChatRequest) -> ChatRequest {
        self.kind.shape_request(request, &self.model)
    }

    pub fn normalize_chunk(&self, chunk: JsonValue) -> JsonValue {
        self.kind.normalize_chunk(chunk)
    }

    pub fn should_retry(&self, status: u16) -> bool {
        self.kind.should_retry(status)
    }

    pub fn should_fallback(&self, status: u16) -> bool {
        self.kind.should_fallback(status)
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
