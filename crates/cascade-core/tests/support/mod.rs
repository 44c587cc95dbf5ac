#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use cascade_core::UpstreamClient;
use cascade_provider_core::{
    ChatRequest, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind, header_get,
};
use cascade_provider_impl::{ProviderKind, ProviderSpec};

/// What the fake upstream does for one request.
pub enum Reply {
    Status(u16, &'static str),
    /// Body chunks; the stream ends after the last one.
    Stream(Vec<String>),
    /// Body chunks, then the connection breaks.
    BrokenAfter(Vec<String>),
    /// Body chunks, then the stream stays open until the reader goes away.
    Hang(Vec<String>),
    Transport,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Replays scripted replies per upstream URL and records what was sent.
#[derive(Default)]
pub struct ScriptedUpstream {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    hanging: Mutex<Vec<mpsc::Sender<Result<Bytes, UpstreamFailure>>>>,
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, provider: &ProviderSpec, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .entry(provider.chat_completions_url())
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, provider: &ProviderSpec) -> usize {
        let url = provider.chat_completions_url();
        self.requests().iter().filter(|r| r.url == url).count()
    }

    /// True once every hanging stream has lost its reader.
    pub fn hanging_streams_released(&self) -> bool {
        self.hanging.lock().unwrap().iter().all(|tx| tx.is_closed())
    }
}

impl UpstreamClient for ScriptedUpstream {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            let authorization = header_get(&req.headers, "authorization").map(str::to_string);
            self.requests.lock().unwrap().push(RecordedRequest {
                url: req.url.clone(),
                authorization,
                body: serde_json::from_slice(&req.body).unwrap_or(Value::Null),
            });
            let reply = self
                .script
                .lock()
                .unwrap()
                .get_mut(&req.url)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Reply::Status(503, "no scripted reply"));

            match reply {
                Reply::Status(status, body) => Ok(UpstreamHttpResponse {
                    status,
                    body: UpstreamBody::Bytes(Bytes::from_static(body.as_bytes())),
                }),
                Reply::Transport => Err(UpstreamFailure::transport(
                    UpstreamTransportErrorKind::Connect,
                    "connection refused",
                )),
                Reply::Stream(chunks) => Ok(stream_response(chunks, None)),
                Reply::BrokenAfter(chunks) => Ok(stream_response(
                    chunks,
                    Some(UpstreamFailure::transport(
                        UpstreamTransportErrorKind::ReadTimeout,
                        "stream idle",
                    )),
                )),
                Reply::Hang(chunks) => {
                    let (tx, rx) = mpsc::channel(chunks.len() + 1);
                    for chunk in chunks {
                        let _ = tx.try_send(Ok(Bytes::from(chunk)));
                    }
                    self.hanging.lock().unwrap().push(tx);
                    Ok(UpstreamHttpResponse {
                        status: 200,
                            body: UpstreamBody::Stream(rx),
                    })
                }
            }
        })
    }
}

fn stream_response(chunks: Vec<String>, failure: Option<UpstreamFailure>) -> UpstreamHttpResponse {
    let (tx, rx) = mpsc::channel(chunks.len() + 1);
    for chunk in chunks {
        let _ = tx.try_send(Ok(Bytes::from(chunk)));
    }
    if let Some(failure) = failure {
        let _ = tx.try_send(Err(failure));
    }
    UpstreamHttpResponse {
        status: 200,
        body: UpstreamBody::Stream(rx),
    }
}

pub fn provider(name: &str, kind: ProviderKind, max_retries: u32) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        kind,
        api_key: format!("key-{name}"),
        base_url: format!("http://{}.test/v1", name.to_ascii_lowercase()),
        model: format!("{}-model", name.to_ascii_lowercase()),
        timeout: Duration::from_secs(30),
        max_retries,
    }
}

pub fn chat_request() -> ChatRequest {
    serde_json::from_value(json!({
        "model": "client-model",
        "messages": [{ "role": "user", "content": "hello" }],
        "stream": true,
        "temperature": 0.5
    }))
    .unwrap()
}

/// One `data:` line carrying a content delta.
pub fn content_line(id: &str, text: &str) -> String {
    let chunk = json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": 1,
        "model": "upstream",
        "choices": [{ "index": 0, "delta": { "content": text }, "finish_reason": null }]
    });
    format!("data: {chunk}\n\n")
}

pub fn done_line() -> String {
    "data: [DONE]\n\n".to_string()
}

/// Splits collected client output into event payloads (`[DONE]` kept as a
/// string). Heartbeat comments are dropped.
pub fn payloads(output: &str) -> Vec<Value> {
    output
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|payload| {
            serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()))
        })
        .collect()
}

pub fn contents(payloads: &[Value]) -> Vec<String> {
    payloads
        .iter()
        .filter_map(|p| p["choices"][0]["delta"]["content"].as_str())
        .map(str::to_string)
        .collect()
}

pub fn done_count(payloads: &[Value]) -> usize {
    payloads.iter().filter(|p| p.as_str() == Some("[DONE]")).count()
}
