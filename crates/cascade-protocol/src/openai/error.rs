use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Text(String),
    Number(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ErrorBody {
    /// Human-readable description: message, else code, else a generic text.
    pub fn summary(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        match &self.code {
            Some(ErrorCode::Text(code)) if !code.is_empty() => code.clone(),
            Some(ErrorCode::Number(code)) => code.to_string(),
            _ => "operation failed".to_string(),
        }
    }
}

/// `{"error": {...}}`, the shape OpenAI-compatible upstreams use for errors,
/// both as HTTP bodies and inside otherwise successful streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: Some(message.into()),
                r#type: Some(r#type.into()),
                code: None,
            },
        }
    }

    /// Returns the error carried by a JSON object, if it has a non-null
    /// `error` member. A bare string error is accepted as the message.
    pub fn detect(value: &JsonValue) -> Option<ErrorBody> {
        let error = value.as_object()?.get("error")?;
        match error {
            JsonValue::Null => None,
            JsonValue::String(message) => Some(ErrorBody {
                message: Some(message.clone()),
                ..Default::default()
            }),
            JsonValue::Object(_) => Some(
                serde_json::from_value::<ErrorBody>(error.clone()).unwrap_or_default(),
            ),
            _ => Some(ErrorBody::default()),
        }
    }

    /// Parses a bare (unframed) line as an error object.
    pub fn detect_str(text: &str) -> Option<ErrorBody> {
        let value = serde_json::from_str::<JsonValue>(text.trim()).ok()?;
        Self::detect(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_embedded_error_objects() {
        let body = ErrorEnvelope::detect(&json!({
            "error": { "message": "quota exceeded", "code": "1113" }
        }))
        .expect("error detected");
        assert_eq!(body.summary(), "quota exceeded");
    }

    #[test]
    fn falls_back_to_code_then_generic_text() {
        let body = ErrorEnvelope::detect(&json!({ "error": { "code": 500 } })).expect("error");
        assert_eq!(body.summary(), "500");
        let body = ErrorEnvelope::detect(&json!({ "error": {} })).expect("error");
        assert_eq!(body.summary(), "operation failed");
    }

    #[test]
    fn ignores_null_error_and_non_objects() {
        assert!(ErrorEnvelope::detect(&json!({ "error": null, "id": "x" })).is_none());
        assert!(ErrorEnvelope::detect(&json!([1, 2])).is_none());
        assert!(ErrorEnvelope::detect_str("upstream said hello").is_none());
        assert!(ErrorEnvelope::detect_str(r#"{"error":"boom"}"#).is_some());
    }
}
