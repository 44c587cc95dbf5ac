use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use cascade_protocol::sse::SSE_HEARTBEAT_FRAME;
use cascade_provider_core::ChatRequest;

use crate::error::ProxyError;
use crate::sink::{CLIENT_SINK_CAPACITY, ClientSink};
use crate::state::AppState;
use crate::validate::validate_chat_request;

const SSE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const REQUEST_ID_HEADER: &str = "x-cascade-request-id";

pub async fn chat_completions_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let mut request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            info!(event = "downstream_rejected", trace_id = %trace_id, error = %err);
            return error_response(ProxyError::bad_request(format!("invalid JSON body: {err}")));
        }
    };
    if let Err(err) = validate_chat_request(&request) {
        info!(event = "downstream_rejected", trace_id = %trace_id, error = %err);
        return error_response(ProxyError::validation(err.details));
    }
    request.stream = Some(true);

    let snapshot = state.snapshot();
    info!(
        event = "downstream_received",
        trace_id = %trace_id,
        model = %request.model,
        messages = request.messages.len(),
        providers = snapshot.len()
    );

    let (sink, rx) = ClientSink::channel(CLIENT_SINK_CAPACITY);
    let orchestrator = state.orchestrator();
    let task_trace_id = trace_id.clone();
    tokio::spawn(async move {
        orchestrator.run(request, snapshot, sink, task_trace_id).await;
    });

    sse_response(rx, &trace_id)
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let timestamp = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    json_response(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "timestamp": timestamp,
            "providers": state.snapshot().names(),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn providers_handler(State(state): State<Arc<AppState>>) -> Response {
    json_response(
        StatusCode::OK,
        json!({
            "providers": state.snapshot().names(),
            "fallbackStrategy": "sequential",
        }),
    )
}

pub async fn reload_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.reload() {
        Ok(snapshot) => {
            info!(event = "registry_reloaded", providers = ?snapshot.names());
            json_response(
                StatusCode::OK,
                json!({
                    "message": "providers reloaded",
                    "providers": snapshot.names(),
                }),
            )
        }
        Err(err) => {
            warn!(event = "registry_reload_failed", error = %err);
            error_response(ProxyError::internal(format!("reload failed: {err}")))
        }
    }
}

fn sse_response(rx: mpsc::Receiver<Bytes>, trace_id: &str) -> Response {
    let stream = ReceiverStream::new(wrap_sse_stream_with_heartbeat(rx)).map(Ok::<_, Infallible>);
    let mut resp = Response::new(Body::from_stream(stream));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    resp
}

/// Interleaves `: keep-alive` comments so idle connections (for example
/// during a retry backoff) survive intermediaries. Dropping the returned
/// receiver also drops `upstream_rx`, which closes the client sink.
fn wrap_sse_stream_with_heartbeat(mut upstream_rx: mpsc::Receiver<Bytes>) -> mpsc::Receiver<Bytes> {
    let (tx, rx) = mpsc::channel::<Bytes>(CLIENT_SINK_CAPACITY);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SSE_HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip immediate tick; first heartbeat should be sent after the interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                maybe_chunk = upstream_rx.recv() => {
                    let Some(chunk) = maybe_chunk else {
                        break;
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if tx.send(Bytes::from_static(SSE_HEARTBEAT_FRAME)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response {
    let mut resp = Response::new(Body::from(value.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

fn error_response(err: ProxyError) -> Response {
    let mut resp = Response::new(Body::from(err.body));
    *resp.status_mut() = err.status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}
