//! Named in-memory queues decoupling request handlers from the background
//! processors.
//!
//! Two byte channels (`control`, `feedback`) plus a registration hand-off
//! queue of device sessions. All three are bounded; a full queue exerts
//! backpressure on its producers.

use async_trait::async_trait;
use tokio::sync::mpsc;

use beacon_common::{BeaconError, BeaconResult};

use crate::session::DeviceSession;

/// Queue of serialized device messages awaiting dispatch.
pub const CONTROL_CHANNEL: &str = "control";

/// Queue of serialized feedback messages awaiting persistence.
pub const FEEDBACK_CHANNEL: &str = "feedback";

/// Depth of every hub queue.
pub const CHANNEL_DEPTH: usize = 10;

/// Publisher seam the request layer depends on, so handlers can be tested
/// without live background processors.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Enqueue an opaque payload onto a named channel, waiting for space.
    /// Unrecognized names fail with `invalid-background-channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> BeaconResult<()>;
}

/// Producer side of the hub queues.
#[derive(Clone)]
pub struct ChannelBus {
    control: mpsc::Sender<Vec<u8>>,
    feedback: mpsc::Sender<Vec<u8>>,
    registrations: mpsc::Sender<DeviceSession>,
}

/// Consumer side, handed to the processors at startup.
pub struct BusReceivers {
    pub control: mpsc::Receiver<Vec<u8>>,
    pub feedback: mpsc::Receiver<Vec<u8>>,
    pub registrations: mpsc::Receiver<DeviceSession>,
}

impl ChannelBus {
    pub fn new() -> (ChannelBus, BusReceivers) {
        let (control_tx, control_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (feedback_tx, feedback_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (registrations_tx, registrations_rx) = mpsc::channel(CHANNEL_DEPTH);

        (
            ChannelBus {
                control: control_tx,
                feedback: feedback_tx,
                registrations: registrations_tx,
            },
            BusReceivers {
                control: control_rx,
                feedback: feedback_rx,
                registrations: registrations_rx,
            },
        )
    }

    /// Hand a freshly registered session to the control processor.
    pub async fn register(&self, session: DeviceSession) -> BeaconResult<()> {
        self.registrations
            .send(session)
            .await
            .map_err(|_| BeaconError::Server("control processor is gone".into()))
    }

    /// Sender the control processor uses to relay device-emitted frames.
    pub fn feedback_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.feedback.clone()
    }

    /// Sender the registration route uses to hand sessions off.
    pub fn registrations(&self) -> mpsc::Sender<DeviceSession> {
        self.registrations.clone()
    }
}

#[async_trait]
impl Publisher for ChannelBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> BeaconResult<()> {
        let queue = match channel {
            CONTROL_CHANNEL => &self.control,
            FEEDBACK_CHANNEL => &self.feedback,
            other => return Err(BeaconError::InvalidChannel(other.to_string())),
        };

        queue
            .send(payload)
            .await
            .map_err(|_| BeaconError::Server(format!("{channel} processor is gone")))
    }
}
