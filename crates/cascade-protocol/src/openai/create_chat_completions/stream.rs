use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::openai::create_chat_completions::types::{
    ChatCompletionStreamResponseDelta, ExtraFields,
};

pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionStreamChoice {
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub delta: ChatCompletionStreamResponseDelta,
    /// Always serialized; `null` while the choice is still streaming.
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateChatCompletionStreamResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_chunk_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChatCompletionStreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn default_chunk_object() -> String {
    CHAT_COMPLETION_CHUNK_OBJECT.to_string()
}

impl CreateChatCompletionStreamResponse {
    /// A content-only chunk with no role and a `null` finish reason, shaped
    /// exactly like ordinary model output.
    pub fn notice(id: String, model: String, content: String) -> Self {
        Self {
            id,
            object: default_chunk_object(),
            created: time::OffsetDateTime::now_utc().unix_timestamp(),
            model,
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta: ChatCompletionStreamResponseDelta {
                    content: Some(content),
                    ..Default::default()
                },
                finish_reason: None,
                extra: ExtraFields::new(),
            }],
            usage: None,
            extra: ExtraFields::new(),
        }
    }
}

/// Every `choices[*].delta.tool_calls` array of a chunk as it came off the
/// wire. Chunks stay untyped on the forwarding path so nothing the upstream
/// sent is lost when they are written back out.
pub fn delta_tool_calls_mut(
    chunk: &mut JsonValue,
) -> impl Iterator<Item = &mut Vec<JsonValue>> {
    chunk
        .get_mut("choices")
        .and_then(JsonValue::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|choice| {
            choice
                .get_mut("delta")?
                .get_mut("tool_calls")?
                .as_array_mut()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_has_null_finish_reason_and_no_role() {
        let chunk = CreateChatCompletionStreamResponse::notice(
            "chatcmpl-switch-1".to_string(),
            "GLM".to_string(),
            "switching".to_string(),
        );
        let value = serde_json::to_value(&chunk).expect("serialize notice");
        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["choices"][0]["delta"]["content"], "switching");
        assert!(value["choices"][0]["delta"].get("role").is_none());
        assert!(value["choices"][0]["finish_reason"].is_null());
        assert!(value["choices"][0].get("finish_reason").is_some());
    }

    #[test]
    fn preserves_provider_specific_fields() {
        let raw = serde_json::json!({
            "id": "c1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "glm-4.5",
            "system_fingerprint": "fp",
            "choices": [{
                "index": 0,
                "delta": { "content": "hi", "annotations": [] },
                "finish_reason": null,
                "logprobs": null
            }]
        });
        let chunk: CreateChatCompletionStreamResponse =
            serde_json::from_value(raw.clone()).expect("deserialize chunk");
        assert_eq!(serde_json::to_value(&chunk).expect("serialize chunk"), raw);
    }

    #[test]
    fn finds_tool_calls_in_every_choice() {
        let mut raw = serde_json::json!({
            "choices": [
                { "delta": { "tool_calls": [{ "index": 3 }] } },
                { "delta": { "content": null } },
                { "delta": { "tool_calls": [{ "index": 9 }, { "index": 9 }] } },
                null
            ]
        });
        let lens: Vec<usize> = delta_tool_calls_mut(&mut raw).map(|calls| calls.len()).collect();
        assert_eq!(lens, [1, 2]);

        let mut not_a_chunk = serde_json::json!(42);
        assert_eq!(delta_tool_calls_mut(&mut not_a_chunk).count(), 0);
    }
}
