use cascade_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use serde_json::Value as JsonValue;

/// Per-provider, stateless request/response rules.
///
/// Every method has the behavior an OpenAI-compatible upstream needs; a
/// provider family overrides only what differs.
pub trait ChatAdapter: Send + Sync {
    /// Copies the caller's request with `model` forced. Nothing else changes,
    /// so shaping the same request twice yields the same body.
    fn shape_request(
        &self,
        request: &CreateChatCompletionRequestBody,
        model: &str,
    ) -> CreateChatCompletionRequestBody {
        let mut shaped = request.clone();
        shaped.model = model.to_string();
        shaped
    }

    /// Receives each data payload exactly as the upstream sent it.
    fn normalize_chunk(&self, chunk: JsonValue) -> JsonValue {
        chunk
    }

    /// Server errors and rate limiting are worth another attempt.
    fn should_retry(&self, status: u16) -> bool {
        status >= 500 || status == 429
    }

    /// Any error status, 4xx included, moves on to the next provider once
    /// retries are spent.
    fn should_fallback(&self, status: u16) -> bool {
        status >= 400
    }
}
