use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Structured observability events emitted by the forwarding pipeline.
///
/// Nothing in the pipeline depends on these being consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ChunkReceived(ChunkReceivedEvent),
    Retry(RetryEvent),
    Fallback(FallbackEvent),
    Terminate(TerminateEvent),
}

impl Event {
    pub fn trace_id(&self) -> &str {
        match self {
            Event::ChunkReceived(ev) => &ev.trace_id,
            Event::Retry(ev) => &ev.trace_id,
            Event::Fallback(ev) => &ev.trace_id,
            Event::Terminate(ev) => &ev.trace_id,
        }
    }
}

/// One raw, non-empty line read from an upstream stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReceivedEvent {
    pub at: SystemTime,
    pub trace_id: String,
    pub attempt_id: String,
    pub provider: String,
    pub line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEvent {
    pub at: SystemTime,
    pub trace_id: String,
    pub attempt_id: String,
    pub provider: String,
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    pub delay_ms: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub at: SystemTime,
    pub trace_id: String,
    /// Provider being left behind.
    pub provider: String,
    pub provider_index: usize,
    /// Fallback count after this transition.
    pub fallback_count: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminateOutcome {
    Completed,
    Failed,
    Exhausted,
    ClientGone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminateEvent {
    pub at: SystemTime,
    pub trace_id: String,
    pub provider: Option<String>,
    pub outcome: TerminateOutcome,
    pub elapsed_ms: u64,
    pub message: Option<String>,
}
