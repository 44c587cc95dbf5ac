use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cascade_protocol::openai::error::ErrorEnvelope;
use cascade_protocol::sse::{SseLine, SseLineBuffer, classify_line, is_done_payload};
use cascade_provider_core::{
    ByteStream, ChatChunk, ChatRequest, ChunkReceivedEvent, Event, EventHub, Headers, RetryEvent,
    UpstreamBody, UpstreamHttpRequest, header_set,
};
use cascade_provider_impl::ProviderSpec;

use crate::error::ClientGone;
use crate::orchestrator::AttemptState;
use crate::sink::ClientSink;
use crate::upstream_client::UpstreamClient;

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 10_000;
/// Upper bound on how much of an error body ends up in logs and reasons.
const ERROR_BODY_LIMIT: usize = 2048;

/// How one provider's attempt sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The stream reached its end marker; the client has seen `[DONE]`.
    Completed,
    /// This provider gave up in a way the next provider may recover from.
    Fallback { reason: String },
    /// Retries are spent and no fallback rule applied.
    Failed { reason: String },
}

/// `min(1000 * 2^(attempt-1), 10000)` milliseconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << exponent);
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

/// Runs the retry loop for one provider and re-frames its stream to the
/// client.
pub struct StreamForwarder<'a> {
    client: &'a dyn UpstreamClient,
    events: &'a EventHub,
    sink: &'a ClientSink,
    trace_id: &'a str,
}

enum StreamEnd {
    Completed,
    /// The upstream reported an error inside a successful response.
    UpstreamError(String),
    /// The body broke off before the end marker.
    Broken { reason: String, forwarded: bool },
}

impl<'a> StreamForwarder<'a> {
    pub fn new(
        client: &'a dyn UpstreamClient,
        events: &'a EventHub,
        sink: &'a ClientSink,
        trace_id: &'a str,
    ) -> Self {
        Self {
            client,
            events,
            sink,
            trace_id,
        }
    }

    /// `has_fallback` tells whether a fallback-eligible HTTP status should
    /// hand over to another provider or end as a hard failure.
    pub async fn forward(
        &self,
        provider: &ProviderSpec,
        request: &ChatRequest,
        state: &mut AttemptState,
        has_fallback: bool,
    ) -> Result<ForwardOutcome, ClientGone> {
        let body = match serde_json::to_vec(&provider.shape_request(request)) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                return Ok(ForwardOutcome::Failed {
                    reason: format!("encode request for {}: {err}", provider.name),
                });
            }
        };
        let url = provider.chat_completions_url();
        let headers = upstream_headers(provider);
        let max_attempts = provider.max_retries.max(1);

        let mut attempt = 1;
        loop {
            state.begin_attempt(attempt, &provider.name, self.trace_id);
            info!(
                event = "upstream_attempt",
                trace_id = %self.trace_id,
                attempt_id = %state.attempt_id,
                provider = %provider.name,
                model = %provider.model,
                attempt,
                max_attempts
            );

            let req = UpstreamHttpRequest {
                url: url.clone(),
                headers: headers.clone(),
                body: body.clone(),
                timeout: provider.timeout,
            };
            let response = tokio::select! {
                biased;
                _ = self.sink.closed() => return Err(ClientGone),
                response = self.client.send(req) => response,
            };
            let retries_left = attempt < max_attempts;

            let reason = match response {
                Err(failure) => {
                    warn!(
                        event = "upstream_transport_error",
                        trace_id = %self.trace_id,
                        attempt_id = %state.attempt_id,
                        provider = %provider.name,
                        timeout = failure.is_timeout(),
                        error = %failure
                    );
                    failure.to_string()
                }
                Ok(response) if !response.is_success() => {
                    let status = response.status;
                    let text = read_error_body(response.body).await;
                    warn!(
                        event = "upstream_http_error",
                        trace_id = %self.trace_id,
                        attempt_id = %state.attempt_id,
                        provider = %provider.name,
                        status,
                        body = %text
                    );
                    let reason = format!("HTTP {status}: {text}");
                    if provider.should_retry(status) && retries_left {
                        self.backoff(provider, state, attempt, &reason).await?;
                        attempt += 1;
                        continue;
                    }
                    if provider.should_fallback(status) && has_fallback {
                        return Ok(ForwardOutcome::Fallback { reason });
                    }
                    return Ok(ForwardOutcome::Failed { reason });
                }
                Ok(response) => match self.stream(provider, state, response.body).await? {
                    StreamEnd::Completed => return Ok(ForwardOutcome::Completed),
                    StreamEnd::UpstreamError(reason) => {
                        warn!(
                            event = "upstream_stream_error",
                            trace_id = %self.trace_id,
                            attempt_id = %state.attempt_id,
                            provider = %provider.name,
                            error = %reason
                        );
                        self.send_switch_notice(provider).await?;
                        return Ok(ForwardOutcome::Fallback { reason });
                    }
                    StreamEnd::Broken { reason, forwarded } => {
                        warn!(
                            event = "upstream_stream_broken",
                            trace_id = %self.trace_id,
                            attempt_id = %state.attempt_id,
                            provider = %provider.name,
                            forwarded,
                            error = %reason
                        );
                        // Retrying would replay content the client already has.
                        if forwarded {
                            self.send_switch_notice(provider).await?;
                            return Ok(ForwardOutcome::Fallback { reason });
                        }
                        reason
                    }
                },
            };

            if !retries_left {
                return Ok(ForwardOutcome::Failed {
                    reason: format!("{max_attempts} attempts exhausted: {reason}"),
                });
            }
            self.backoff(provider, state, attempt, &reason).await?;
            attempt += 1;
        }
    }

    async fn backoff(
        &self,
        provider: &ProviderSpec,
        state: &AttemptState,
        attempt: u32,
        reason: &str,
    ) -> Result<(), ClientGone> {
        let delay = backoff_delay(attempt);
        info!(
            event = "upstream_retry",
            trace_id = %self.trace_id,
            attempt_id = %state.attempt_id,
            provider = %provider.name,
            attempt,
            delay_ms = delay.as_millis() as u64
        );
        self.events
            .emit(Event::Retry(RetryEvent {
                at: SystemTime::now(),
                trace_id: self.trace_id.to_string(),
                attempt_id: state.attempt_id.clone(),
                provider: provider.name.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                reason: reason.to_string(),
            }))
            .await;
        tokio::select! {
            biased;
            _ = self.sink.closed() => Err(ClientGone),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn stream(
        &self,
        provider: &ProviderSpec,
        state: &AttemptState,
        body: UpstreamBody,
    ) -> Result<StreamEnd, ClientGone> {
        let mut rx = into_byte_stream(body);
        let mut lines = SseLineBuffer::new();
        let mut forwarded = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.sink.closed() => return Err(ClientGone),
                next = rx.recv() => next,
            };
            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(failure)) => {
                    return Ok(StreamEnd::Broken {
                        reason: failure.to_string(),
                        forwarded,
                    });
                }
            };
            for line in lines.push_bytes(&chunk) {
                if let Some(end) = self.handle_line(provider, state, &line, &mut forwarded).await? {
                    return Ok(end);
                }
            }
        }

        if let Some(rest) = lines.finish() {
            if let Some(end) = self.handle_line(provider, state, &rest, &mut forwarded).await? {
                return Ok(end);
            }
        }
        // Closed without an end marker; still give the client exactly one.
        debug!(
            event = "upstream_eof_without_done",
            trace_id = %self.trace_id,
            attempt_id = %state.attempt_id,
            provider = %provider.name
        );
        self.sink.send_done().await?;
        Ok(StreamEnd::Completed)
    }

    async fn handle_line(
        &self,
        provider: &ProviderSpec,
        state: &AttemptState,
        line: &str,
        forwarded: &mut bool,
    ) -> Result<Option<StreamEnd>, ClientGone> {
        let classified = classify_line(line);
        if classified == SseLine::Blank {
            return Ok(None);
        }
        self.events
            .emit(Event::ChunkReceived(ChunkReceivedEvent {
                at: SystemTime::now(),
                trace_id: self.trace_id.to_string(),
                attempt_id: state.attempt_id.clone(),
                provider: provider.name.clone(),
                line: line.to_string(),
            }))
            .await;

        match classified {
            SseLine::Blank | SseLine::Comment => Ok(None),
            SseLine::Data(payload) => {
                if is_done_payload(payload) {
                    self.sink.send_done().await?;
                    return Ok(Some(StreamEnd::Completed));
                }
                let value = match serde_json::from_str::<JsonValue>(payload) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(
                            event = "upstream_line_skipped",
                            trace_id = %self.trace_id,
                            attempt_id = %state.attempt_id,
                            provider = %provider.name,
                            error = %err
                        );
                        return Ok(None);
                    }
                };
                if let Some(error) = ErrorEnvelope::detect(&value) {
                    return Ok(Some(StreamEnd::UpstreamError(error.summary())));
                }
                self.sink.send_json(&provider.normalize_chunk(value)).await?;
                *forwarded = true;
                Ok(None)
            }
            SseLine::Other(text) => match ErrorEnvelope::detect_str(text) {
                Some(error) => Ok(Some(StreamEnd::UpstreamError(error.summary()))),
                None => {
                    debug!(
                        event = "upstream_line_ignored",
                        trace_id = %self.trace_id,
                        provider = %provider.name,
                        line = %text
                    );
                    Ok(None)
                }
            },
        }
    }

    async fn send_switch_notice(&self, provider: &ProviderSpec) -> Result<(), ClientGone> {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let notice = ChatChunk::notice(
            format!("chatcmpl-switch-{millis}"),
            provider.name.clone(),
            switch_notice_text(&provider.name),
        );
        self.sink.send_json(&notice).await
    }
}

pub fn switch_notice_text(provider: &str) -> String {
    format!(
        "\n\n[system notice: {provider} ran into a problem, switching to a backup provider...]\n\n"
    )
}

fn upstream_headers(provider: &ProviderSpec) -> Headers {
    let mut headers = Headers::new();
    header_set(
        &mut headers,
        "authorization",
        format!("Bearer {}", provider.api_key),
    );
    header_set(&mut headers, "content-type", "application/json");
    header_set(&mut headers, "accept", "text/event-stream");
    headers
}

fn into_byte_stream(body: UpstreamBody) -> ByteStream {
    match body {
        UpstreamBody::Stream(rx) => rx,
        UpstreamBody::Bytes(bytes) => {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(Ok(bytes));
            rx
        }
    }
}

async fn read_error_body(body: UpstreamBody) -> String {
    let raw = match body {
        UpstreamBody::Bytes(bytes) => bytes.to_vec(),
        UpstreamBody::Stream(mut rx) => {
            let mut out = Vec::new();
            while out.len() < ERROR_BODY_LIMIT {
                match rx.recv().await {
                    Some(Ok(chunk)) => out.extend_from_slice(&chunk),
                    _ => break,
                }
            }
            out
        }
    };
    let text = String::from_utf8_lossy(&raw);
    let text = text.trim();
    if let Some(error) = ErrorEnvelope::detect_str(text) {
        return error.summary();
    }
    text.chars().take(ERROR_BODY_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_ten_seconds() {
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| backoff_delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, [1000, 2000, 4000, 8000, 10_000, 10_000]);
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn notice_names_the_failing_provider() {
        let text = switch_notice_text("GLM");
        assert!(text.starts_with("\n\n[system notice: GLM"));
        assert!(text.ends_with("]\n\n"));
    }

    #[tokio::test]
    async fn error_bodies_are_summarized() {
        let body = UpstreamBody::Bytes(Bytes::from_static(
            br#"{"error":{"message":"rate limited","type":"rate_limit"}}"#,
        ));
        assert_eq!(read_error_body(body).await, "rate limited");
        let body = UpstreamBody::Bytes(Bytes::from_static(b"  bad gateway \n"));
        assert_eq!(read_error_body(body).await, "bad gateway");
    }
}
