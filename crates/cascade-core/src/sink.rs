use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use cascade_protocol::sse::{sse_done_bytes, sse_json_bytes};

use crate::error::ClientGone;

pub const CLIENT_SINK_CAPACITY: usize = 32;

/// Write side of one client's event stream.
///
/// The channel is bounded: a slow client makes `send` wait, which in turn
/// stops the forwarder from reading the upstream body.
#[derive(Debug, Clone)]
pub struct ClientSink {
    tx: mpsc::Sender<Bytes>,
}

impl ClientSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn send(&self, frame: Bytes) -> Result<(), ClientGone> {
        self.tx.send(frame).await.map_err(|_| ClientGone)
    }

    /// Sends one `data:` event. Values that fail to serialize are dropped.
    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<(), ClientGone> {
        match sse_json_bytes(value) {
            Some(frame) => self.send(frame).await,
            None => Ok(()),
        }
    }

    pub async fn send_done(&self) -> Result<(), ClientGone> {
        self.send(sse_done_bytes()).await
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
