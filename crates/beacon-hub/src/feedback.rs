//! The feedback processor.
//!
//! Drains the feedback queue into the registry's bounded per-device
//! history. Nothing here propagates: undecodable payloads and storage
//! faults are logged and the item dropped.

use std::sync::Arc;

use prost::Message as _;
use tokio::sync::mpsc;

use beacon_common::interchange::FeedbackMessage;
use beacon_store::FeedbackStore;

pub struct FeedbackProcessor {
    feedback: mpsc::Receiver<Vec<u8>>,
    kill: mpsc::Receiver<()>,
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackProcessor {
    pub fn new(
        feedback: mpsc::Receiver<Vec<u8>>,
        kill: mpsc::Receiver<()>,
        store: Arc<dyn FeedbackStore>,
    ) -> Self {
        FeedbackProcessor {
            feedback,
            kill,
            store,
        }
    }

    /// Run until the queue closes or the kill switch fires.
    pub async fn run(mut self) {
        tracing::info!("feedback processor starting");

        loop {
            tokio::select! {
                maybe = self.feedback.recv() => match maybe {
                    Some(payload) => self.persist(payload).await,
                    None => break,
                },
                _ = self.kill.recv() => {
                    tracing::info!("feedback processor received kill token");
                    break;
                },
            }
        }

        tracing::info!("feedback processor stopped");
    }

    async fn persist(&self, payload: Vec<u8>) {
        let message = match FeedbackMessage::decode(payload.as_slice()) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable feedback payload");
                return;
            }
        };

        if let Err(error) = self.store.log_feedback(message).await {
            tracing::warn!(%error, "unable to persist feedback");
        }
    }
}
