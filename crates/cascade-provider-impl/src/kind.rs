use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use cascade_provider_core::{ChatAdapter, ChatRequest};

use crate::providers::custom::CustomAdapter;
use crate::providers::glm::GlmAdapter;
use crate::providers::kimi::KimiAdapter;
use crate::providers::modelscope::ModelScopeAdapter;

/// Provider family. Each family's request/response rules live in its own
/// module under `providers/`; this enum is the single dispatch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Glm,
    Kimi,
    ModelScope,
    Custom,
}

impl ProviderKind {
    fn adapter(self) -> &'static dyn ChatAdapter {
        match self {
            ProviderKind::Glm => &GlmAdapter,
            ProviderKind::Kimi => &KimiAdapter,
            ProviderKind::ModelScope => &ModelScopeAdapter,
            ProviderKind::Custom => &CustomAdapter,
        }
    }
}

impl ChatAdapter for ProviderKind {
    fn shape_request(&self, request: &ChatRequest, model: &str) -> ChatRequest {
        self.adapter().shape_request(request, model)
    }

    fn normalize_chunk(&self, chunk: JsonValue) -> JsonValue {
        self.adapter().normalize_chunk(chunk)
    }

    fn should_retry(&self, status: u16) -> bool {
        self.adapter().should_retry(status)
    }

    fn should_fallback(&self, status: u16) -> bool {
        self.adapter().should_fallback(status)
    }
}
