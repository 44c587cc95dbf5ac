use bytes::Bytes;
use serde::Serialize;

pub const SSE_DONE_FRAME: &[u8] = b"data: [DONE]\n\n";
pub const SSE_HEARTBEAT_FRAME: &[u8] = b": keep-alive\n\n";
pub const DONE_MARKER: &str = "[DONE]";

/// One physical line of an upstream event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Payload of a `data:` line, one leading space removed.
    Data(&'a str),
    Comment,
    Blank,
    /// Any other non-empty text (often a bare JSON error body).
    Other(&'a str),
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    if line.trim().is_empty() {
        return SseLine::Blank;
    }
    if let Some(value) = line.strip_prefix("data:") {
        return SseLine::Data(value.strip_prefix(' ').unwrap_or(value));
    }
    if line.starts_with(':') {
        return SseLine::Comment;
    }
    SseLine::Other(line)
}

/// The end-of-stream sentinel. An empty payload also ends the stream.
pub fn is_done_payload(payload: &str) -> bool {
    let payload = payload.trim();
    payload.is_empty() || payload == DONE_MARKER
}

/// Incremental line splitter for a byte stream.
///
/// Bytes are decoded as UTF-8 across chunk boundaries; every complete line is
/// returned (without the `\n` / `\r\n` terminator) and the trailing partial
/// line stays buffered until more bytes arrive or [`SseLineBuffer::finish`].
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
    undecoded: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<String> {
        self.undecoded.extend_from_slice(chunk);
        self.decode_pending();
        self.drain_lines()
    }

    /// Whatever is left after the last newline, trimmed. Clears the buffer.
    pub fn finish(&mut self) -> Option<String> {
        if !self.undecoded.is_empty() {
            let rest = std::mem::take(&mut self.undecoded);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.undecoded.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.undecoded[..valid]) {
                        self.buffer.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.drain(..valid + len);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.undecoded.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }
}

pub fn sse_json_bytes<T: Serialize>(value: &T) -> Option<Bytes> {
    let payload = serde_json::to_vec(value).ok()?;
    let mut data = Vec::with_capacity(payload.len() + 8);
    data.extend_from_slice(b"data: ");
    data.extend_from_slice(&payload);
    data.extend_from_slice(b"\n\n");
    Some(Bytes::from(data))
}

pub fn sse_done_bytes() -> Bytes {
    Bytes::from_static(SSE_DONE_FRAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(buf: &mut SseLineBuffer, text: &str) -> Vec<String> {
        buf.push_bytes(&Bytes::copy_from_slice(text.as_bytes()))
    }

    #[test]
    fn keeps_partial_lines_until_newline() {
        let mut buf = SseLineBuffer::new();
        assert!(push(&mut buf, "data: {\"a\"").is_empty());
        let lines = push(&mut buf, ":1}\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        let lines = push(&mut buf, "NE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert!(buf.finish().is_none());
    }

    #[test]
    fn decodes_utf8_split_across_chunks() {
        let mut buf = SseLineBuffer::new();
        let text = "data: 你好\n".as_bytes();
        let (head, tail) = text.split_at(8);
        assert!(buf.push_bytes(&Bytes::copy_from_slice(head)).is_empty());
        let lines = buf.push_bytes(&Bytes::copy_from_slice(tail));
        assert_eq!(lines, vec!["data: 你好".to_string()]);
    }

    #[test]
    fn finish_returns_trailing_fragment() {
        let mut buf = SseLineBuffer::new();
        push(&mut buf, "data: x\n{\"error\":{\"message\":\"boom\"}}  ");
        assert_eq!(
            buf.finish().as_deref(),
            Some("{\"error\":{\"message\":\"boom\"}}")
        );
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify_line("data: {}"), SseLine::Data("{}"));
        assert_eq!(classify_line("data:{}"), SseLine::Data("{}"));
        assert_eq!(classify_line(": ping"), SseLine::Comment);
        assert_eq!(classify_line("   "), SseLine::Blank);
        assert_eq!(classify_line("event: x"), SseLine::Other("event: x"));
        assert!(is_done_payload(" [DONE] "));
        assert!(is_done_payload(""));
        assert!(!is_done_payload("{}"));
    }

    #[test]
    fn frames_json_payloads() {
        let bytes = sse_json_bytes(&serde_json::json!({ "a": 1 })).expect("encode");
        assert_eq!(&bytes[..], b"data: {\"a\":1}\n\n");
    }
}
