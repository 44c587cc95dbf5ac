use std::time::Duration;

use serde_json::Value as JsonValue;

use cascade_protocol::openai::create_chat_completions::stream::delta_tool_calls_mut;
use cascade_provider_core::ChatAdapter;

use super::ProviderPreset;
use crate::kind::ProviderKind;

pub const PRESET: ProviderPreset = ProviderPreset {
    key: "glm",
    kind: ProviderKind::Glm,
    name: "GLM",
    base_url: "https://open.bigmodel.cn/api/paas/v4",
    model: "glm-4.5",
    timeout: Duration::from_secs(3 * 60),
    api_key_env: "GLM_API_KEY",
    base_url_env: "GLM_BASE_URL",
};

/// GLM streams tool-call deltas whose `index` may repeat or skip values.
pub struct GlmAdapter;

impl ChatAdapter for GlmAdapter {
    fn normalize_chunk(&self, mut chunk: JsonValue) -> JsonValue {
        for tool_calls in delta_tool_calls_mut(&mut chunk) {
            for (position, call) in tool_calls.iter_mut().enumerate() {
                if let Some(call) = call.as_object_mut() {
                    call.insert("index".to_string(), JsonValue::from(position));
                }
            }
        }
        chunk
    }
}
