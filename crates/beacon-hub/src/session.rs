//! Device sessions and the in-memory session pool.
//!
//! A session owns exactly one bidirectional binary stream. The stream is
//! split at construction: the sink lives behind an async mutex so writes
//! are serialized and frames never interleave; the source is taken exactly
//! once by the control processor's subscribe task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use prost::Message as _;
use tokio::sync::Mutex;
use uuid::Uuid;

use beacon_common::interchange::DeviceMessage;
use beacon_common::keys::DeviceKey;
use beacon_common::{BeaconError, BeaconResult};

/// Write half of a device stream.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete binary frame.
    async fn send_frame(&mut self, frame: Vec<u8>) -> BeaconResult<()>;

    /// Close the stream for writing.
    async fn close_frame(&mut self) -> BeaconResult<()>;
}

/// Read half of a device stream. `None` means the stream ended cleanly.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<BeaconResult<Vec<u8>>>;
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: Vec<u8>) -> BeaconResult<()> {
        self.send(Message::Binary(frame.into()))
            .await
            .map_err(|error| BeaconError::Stream(error.to_string()))
    }

    async fn close_frame(&mut self) -> BeaconResult<()> {
        self.close()
            .await
            .map_err(|error| BeaconError::Stream(error.to_string()))
    }
}

#[async_trait]
impl FrameSource for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<BeaconResult<Vec<u8>>> {
        loop {
            match self.next().await {
                Some(Ok(Message::Binary(data))) => return Some(Ok(data.to_vec())),
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return None,
                // Keepalive traffic is not feedback.
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Some(Err(BeaconError::Stream(error.to_string()))),
            }
        }
    }
}

/// One live connection to one device.
pub struct DeviceSession {
    id: Uuid,
    signer: DeviceKey,
    sink: Mutex<Box<dyn FrameSink>>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    closed: AtomicBool,
}

impl DeviceSession {
    pub fn new(
        id: Uuid,
        signer: DeviceKey,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> Self {
        DeviceSession {
            id,
            signer,
            sink: Mutex::new(sink),
            source: Mutex::new(Some(source)),
            closed: AtomicBool::new(false),
        }
    }

    /// Wrap a freshly upgraded websocket.
    pub fn from_socket(id: Uuid, signer: DeviceKey, socket: WebSocket) -> Self {
        let (sink, source) = socket.split();
        DeviceSession::new(id, signer, Box::new(sink), Box::new(source))
    }

    /// The device id assigned at registration time.
    pub fn id(&self) -> String {
        self.id.to_string()
    }

    /// Sign and write one envelope as a single frame.
    ///
    /// The payload digest is computed over the already-serialized inner
    /// message, signed with the device's key, and stamped into the
    /// authentication block before the envelope is encoded.
    pub async fn send(&self, mut message: DeviceMessage) -> BeaconResult<()> {
        let digest = self.signer.message_digest(&message.payload)?;

        message
            .authentication
            .get_or_insert_with(Default::default)
            .message_digest = digest;

        let frame = message.encode_to_vec();
        self.sink.lock().await.send_frame(frame).await
    }

    /// Hand the read half to its one reader. Subsequent calls return `None`.
    pub async fn take_source(&self) -> Option<Box<dyn FrameSource>> {
        self.source.lock().await.take()
    }

    /// Close the underlying stream. Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(error) = self.sink.lock().await.close_frame().await {
            tracing::debug!(device = %self.id, %error, "error closing device stream");
        }
    }
}

/// The set of currently live sessions, keyed by device id.
///
/// Mutations happen from the control processor's supervisor loop and from
/// its subscribe/unsubscribe tasks; the mutex serializes them.
#[derive(Default)]
pub struct SessionPool {
    sessions: Mutex<HashMap<String, Arc<DeviceSession>>>,
}

impl SessionPool {
    pub fn new() -> Self {
        SessionPool::default()
    }

    /// Insert a session. At most one session per device id is live; a
    /// duplicate id replaces the previous entry.
    pub async fn insert(&self, session: Arc<DeviceSession>) {
        self.sessions.lock().await.insert(session.id(), session);
    }

    pub async fn get(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.lock().await.get(device_id).cloned()
    }

    pub async fn remove(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.lock().await.remove(device_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Empty the pool, returning every session for teardown.
    pub async fn drain(&self) -> Vec<Arc<DeviceSession>> {
        self.sessions.lock().await.drain().map(|(_, s)| s).collect()
    }
}
