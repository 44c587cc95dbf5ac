use std::fmt;

use cascade_provider_core::ChatRequest;

/// Every rule the request broke, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub details: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request: {}", self.details.join("; "))
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_chat_request(request: &ChatRequest) -> Result<(), ValidationError> {
    let mut details = Vec::new();

    if request.model.trim().is_empty() {
        details.push("model is required".to_string());
    }
    if request.messages.is_empty() {
        details.push("messages must contain at least one message".to_string());
    }
    if !request.is_stream() {
        details.push("stream must be true; only streaming responses are supported".to_string());
    }
    for (index, message) in request.messages.iter().enumerate() {
        if !message.has_content() && !message.has_tool_calls() {
            details.push(format!("messages[{index}] needs content or tool_calls"));
        }
    }
    check_range(&mut details, "temperature", request.temperature, 0.0, 2.0);
    check_range(&mut details, "top_p", request.top_p, 0.0, 1.0);
    if let Some(max_tokens) = request.max_tokens
        && max_tokens <= 0
    {
        details.push("max_tokens must be a positive integer".to_string());
    }
    check_range(
        &mut details,
        "frequency_penalty",
        request.frequency_penalty,
        -2.0,
        2.0,
    );
    check_range(
        &mut details,
        "presence_penalty",
        request.presence_penalty,
        -2.0,
        2.0,
    );

    if details.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { details })
    }
}

fn check_range(details: &mut Vec<String>, field: &str, value: Option<f64>, min: f64, max: f64) {
    if let Some(value) = value
        && !(min..=max).contains(&value)
    {
        details.push(format!("{field} must be between {min} and {max}"));
    }
}
