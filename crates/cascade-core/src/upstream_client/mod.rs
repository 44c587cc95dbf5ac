use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use wreq::{Client, Proxy};

use cascade_common::GlobalConfig;
use cascade_provider_core::{
    ByteStream, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};

pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl UpstreamClientConfig {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            proxy: global.proxy.clone(),
            stream_idle_timeout: global.stream_idle_timeout(),
            ..Self::default()
        }
    }
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(86400),
            stream_idle_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct WreqUpstreamClient {
    client: Client,
    stream_idle_timeout: Duration,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let proxy = normalize_proxy(config.proxy.clone());
        Ok(Self {
            client: build_client(&config, proxy.as_deref())?,
            stream_idle_timeout: config.stream_idle_timeout,
        })
    }
}

fn normalize_proxy(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}

fn build_client(config: &UpstreamClientConfig, proxy: Option<&str>) -> Result<Client, wreq::Error> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .read_timeout(config.stream_idle_timeout);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

impl UpstreamClient for WreqUpstreamClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut builder = self.client.post(&req.url);
            for (k, v) in &req.headers {
                builder = builder.header(k, v);
            }
            builder = builder.body(req.body);

            // The provider timeout covers connecting and waiting for headers.
            let resp = match tokio::time::timeout(req.timeout, builder.send()).await {
                Ok(result) => result.map_err(map_wreq_error)?,
                Err(_) => {
                    return Err(UpstreamFailure::transport(
                        UpstreamTransportErrorKind::Timeout,
                        format!("no response headers within {}ms", req.timeout.as_millis()),
                    ));
                }
            };
            convert_response(resp, self.stream_idle_timeout).await
        })
    }
}

/// Upper bound on how much of a non-success body is read off the wire.
const ERROR_BODY_READ_LIMIT: usize = 64 * 1024;
const BODY_CHANNEL_CAPACITY: usize = 16;

async fn convert_response(
    resp: wreq::Response,
    stream_idle_timeout: Duration,
) -> Result<UpstreamHttpResponse, UpstreamFailure> {
    let status = resp.status().as_u16();
    let stream = resp
        .bytes_stream()
        .map(|item| item.map_err(map_wreq_error));

    if !(200..300).contains(&status) {
        let body = read_capped(stream, ERROR_BODY_READ_LIMIT, stream_idle_timeout).await?;
        return Ok(UpstreamHttpResponse {
            status,
            body: UpstreamBody::Bytes(body),
        });
    }

    Ok(UpstreamHttpResponse {
        status,
        body: UpstreamBody::Stream(spawn_body_reader(stream, stream_idle_timeout)),
    })
}

/// Reads at most `limit` bytes and drops the rest of the body unread.
async fn read_capped<S>(
    stream: S,
    limit: usize,
    stream_idle_timeout: Duration,
) -> Result<Bytes, UpstreamFailure>
where
    S: Stream<Item = Result<Bytes, UpstreamFailure>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut out = BytesMut::new();
    while out.len() < limit {
        match tokio::time::timeout(stream_idle_timeout, stream.next()).await {
            Ok(Some(chunk)) => {
                let chunk = chunk?;
                let take = chunk.len().min(limit - out.len());
                out.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(_) => return Err(idle_failure(stream_idle_timeout)),
        }
    }
    Ok(out.freeze())
}

/// Pumps the body into a bounded channel. The task stops, and drops the
/// upstream stream with it, as soon as the receiver goes away, even while
/// the upstream is silent.
fn spawn_body_reader<S>(stream: S, stream_idle_timeout: Duration) -> ByteStream
where
    S: Stream<Item = Result<Bytes, UpstreamFailure>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes, UpstreamFailure>>(BODY_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut stream = std::pin::pin!(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => break,
                next = tokio::time::timeout(stream_idle_timeout, stream.next()) => next,
            };
            let item = match next {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => Err(idle_failure(stream_idle_timeout)),
            };
            let stop = item.is_err();
            if tx.send(item).await.is_err() || stop {
                break;
            }
        }
    });
    rx
}

fn idle_failure(stream_idle_timeout: Duration) -> UpstreamFailure {
    UpstreamFailure::transport(
        UpstreamTransportErrorKind::ReadTimeout,
        format!("stream idle for {}s", stream_idle_timeout.as_secs()),
    )
}

fn map_wreq_error(err: wreq::Error) -> UpstreamFailure {
    let kind = classify_wreq_error(&err);
    UpstreamFailure::Transport {
        kind,
        message: err.to_string(),
    }
}

fn classify_wreq_error(err: &wreq::Error) -> UpstreamTransportErrorKind {
    let message = err.to_string().to_ascii_lowercase();
    if err.is_timeout() {
        if message.contains("read") || message.contains("idle") {
            return UpstreamTransportErrorKind::ReadTimeout;
        }
        return UpstreamTransportErrorKind::Timeout;
    }
    if err.is_connect() {
        if message.contains("dns") || message.contains("resolve") {
            return UpstreamTransportErrorKind::Dns;
        }
        if message.contains("tls") || message.contains("ssl") {
            return UpstreamTransportErrorKind::Tls;
        }
        return UpstreamTransportErrorKind::Connect;
    }
    if message.contains("tls") || message.contains("ssl") {
        return UpstreamTransportErrorKind::Tls;
    }
    UpstreamTransportErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_proxy_is_ignored() {
        assert_eq!(normalize_proxy(Some("  ".into())), None);
        assert_eq!(
            normalize_proxy(Some(" http://127.0.0.1:7890 ".into())).as_deref(),
            Some("http://127.0.0.1:7890")
        );
    }

    #[test]
    fn config_follows_global_idle_timeout() {
        let global = GlobalConfig {
            stream_idle_timeout_secs: 45,
            proxy: Some("socks5://proxy:1080".into()),
            ..GlobalConfig::default()
        };
        let config = UpstreamClientConfig::from_global(&global);
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(45));
        assert_eq!(config.proxy.as_deref(), Some("socks5://proxy:1080"));
    }

    #[tokio::test]
    async fn reader_lets_go_of_a_silent_upstream_once_the_receiver_drops() {
        let (source_tx, source_rx) = mpsc::channel::<Result<Bytes, UpstreamFailure>>(4);
        source_tx.send(Ok(Bytes::from_static(b"data: {}\n\n"))).await.unwrap();
        let source = tokio_stream::wrappers::ReceiverStream::new(source_rx);

        let mut rx = spawn_body_reader(source, Duration::from_secs(120));
        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"data: {}\n\n"));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), source_tx.closed())
            .await
            .expect("upstream stream dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn reader_reports_an_idle_upstream() {
        let (_source_tx, source_rx) = mpsc::channel::<Result<Bytes, UpstreamFailure>>(1);
        let source = tokio_stream::wrappers::ReceiverStream::new(source_rx);

        let mut rx = spawn_body_reader(source, Duration::from_secs(30));
        let failure = rx.recv().await.unwrap().unwrap_err();
        assert!(failure.is_timeout());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn error_body_read_stops_at_the_limit() {
        let chunks = vec![
            Ok(Bytes::from(vec![b'a'; 6])),
            Ok(Bytes::from(vec![b'b'; 6])),
            Err(UpstreamFailure::transport(UpstreamTransportErrorKind::Other, "never read")),
        ];
        let body = read_capped(futures_util::stream::iter(chunks), 8, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"aaaaaabb"));

        let short = futures_util::stream::iter(vec![Ok(Bytes::from_static(b"bad gateway"))]);
        let body = read_capped(short, 8, Duration::from_secs(5)).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"bad gate"));
    }
}
