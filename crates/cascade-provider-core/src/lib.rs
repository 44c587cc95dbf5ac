//! Core provider abstractions for cascade.
//!
//! This crate does not depend on axum or any concrete HTTP client. Adapters
//! shape requests and repair chunks; a higher layer performs IO.

pub mod adapter;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;

pub use adapter::ChatAdapter;
pub use errors::{ProviderError, ProviderResult};
pub use events::{
    ChunkReceivedEvent, Event, EventHub, EventSink, FallbackEvent, RetryEvent, TerminalEventSink,
    TerminateEvent, TerminateOutcome,
};
pub use headers::{Headers, header_get, header_set};
pub use provider::{
    ByteStream, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};

pub use cascade_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody as ChatRequest;
pub use cascade_protocol::openai::create_chat_completions::stream::CreateChatCompletionStreamResponse as ChatChunk;
