use std::future::Future;
use std::pin::Pin;

use super::{Event, EventSink};

const MAX_LINE_CHARS: usize = 160;

/// Best-effort terminal sink for structured events.
///
/// Prints one JSON line per event to stderr. Raw upstream lines are cut to a
/// readable width.
pub struct TerminalEventSink;

impl TerminalEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TerminalEventSink {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let printable = truncate_for_display(event);
            match serde_json::to_string(&printable) {
                Ok(line) => {
                    // stderr keeps stdout clean.
                    eprintln!("{line}");
                }
                Err(err) => {
                    eprintln!("{{\"event\":\"event_serialize_error\",\"error\":\"{err}\"}}");
                }
            }
        })
    }
}

fn truncate_for_display(event: &Event) -> Event {
    let mut event = event.clone();
    if let Event::ChunkReceived(chunk) = &mut event
        && chunk.line.chars().count() > MAX_LINE_CHARS
    {
        let cut: String = chunk.line.chars().take(MAX_LINE_CHARS - 3).collect();
        chunk.line = format!("{cut}...");
    }
    event
}
