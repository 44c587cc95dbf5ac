//! OpenAI chat-completions wire types and SSE framing shared by the gateway.

pub mod openai;
pub mod sse;
