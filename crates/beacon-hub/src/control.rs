//! The control processor.
//!
//! One supervisor loop multiplexes three event sources (outbound command
//! payloads, freshly registered sessions, and the kill switch) and owns
//! the session pool. Each command is dispatched on its own task so a slow
//! device never blocks other traffic; each registration fans out into a
//! welcome task and a subscribe task.

use std::sync::Arc;
use std::time::Duration;

use prost::Message as _;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use beacon_common::interchange::{
    DeviceMessage, DeviceMessageAuthentication, DeviceMessageKind, WelcomeMessage,
};
use beacon_common::keys::ServerKey;
use beacon_common::{BeaconError, WELCOME_BANNER};
use beacon_store::DeviceIndex;

use crate::session::{DeviceSession, SessionPool};

/// Interval of the pool-size diagnostic log line.
const POOL_TICK: Duration = Duration::from_secs(60);

pub struct ControlProcessor {
    commands: mpsc::Receiver<Vec<u8>>,
    registrations: mpsc::Receiver<DeviceSession>,
    kill: mpsc::Receiver<()>,
    feedback: mpsc::Sender<Vec<u8>>,
    registry: Arc<dyn DeviceIndex>,
    server_key: Arc<ServerKey>,
    pool: Arc<SessionPool>,
}

impl ControlProcessor {
    pub fn new(
        commands: mpsc::Receiver<Vec<u8>>,
        registrations: mpsc::Receiver<DeviceSession>,
        kill: mpsc::Receiver<()>,
        feedback: mpsc::Sender<Vec<u8>>,
        registry: Arc<dyn DeviceIndex>,
        server_key: Arc<ServerKey>,
    ) -> Self {
        ControlProcessor {
            commands,
            registrations,
            kill,
            feedback,
            registry,
            server_key,
            pool: Arc::new(SessionPool::new()),
        }
    }

    /// Shared handle on the session pool, mainly for diagnostics and tests.
    pub fn pool(&self) -> Arc<SessionPool> {
        self.pool.clone()
    }

    /// Run until the kill switch fires or every producer goes away, then
    /// close all live sessions and wait for spawned work to finish.
    pub async fn run(mut self) {
        tracing::info!("control processor starting");

        let mut tasks = JoinSet::new();
        let mut tick = tokio::time::interval_at(
            tokio::time::Instant::now() + POOL_TICK,
            POOL_TICK,
        );
        let mut running = true;

        while running {
            tokio::select! {
                maybe = self.commands.recv() => match maybe {
                    Some(payload) => self.dispatch(payload, &mut tasks),
                    None => running = false,
                },
                maybe = self.registrations.recv() => match maybe {
                    Some(session) => self.adopt(session, &mut tasks),
                    None => running = false,
                },
                _ = tick.tick() => {
                    let live = self.pool.len().await;
                    tracing::debug!(pool = live, "session pool status");
                },
                _ = self.kill.recv() => {
                    tracing::info!("control processor received kill token");
                    running = false;
                },
            }
        }

        for session in self.pool.drain().await {
            tracing::info!(device = %session.id(), "closing session on shutdown");
            session.close().await;
        }

        while tasks.join_next().await.is_some() {}

        tracing::info!("control processor stopped");
    }

    /// Decode one command payload and relay it to the matching session.
    fn dispatch(&self, payload: Vec<u8>, tasks: &mut JoinSet<()>) {
        let message = match DeviceMessage::decode(payload.as_slice()) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable command payload");
                return;
            }
        };

        let device_id = message
            .authentication
            .as_ref()
            .map(|auth| auth.device_id.clone())
            .unwrap_or_default();

        let pool = self.pool.clone();
        let registry = self.registry.clone();

        tasks.spawn(async move {
            let Some(session) = pool.get(&device_id).await else {
                tracing::warn!(device = %device_id, "no live session for command");
                return;
            };

            match session.send(message).await {
                Ok(()) => tracing::debug!(device = %device_id, "relayed command"),
                Err(BeaconError::Stream(error)) => {
                    tracing::warn!(device = %device_id, %error, "write failed; dropping session");
                    unsubscribe(&pool, registry.as_ref(), &session).await;
                }
                // Signing or encoding faults abort this message only.
                Err(error) => {
                    tracing::warn!(device = %device_id, %error, "unable to relay command");
                }
            }
        });
    }

    /// Fan a new registration out into its welcome and subscribe tasks.
    fn adopt(&self, session: DeviceSession, tasks: &mut JoinSet<()>) {
        let session = Arc::new(session);

        let welcoming = session.clone();
        let server_key = self.server_key.clone();
        tasks.spawn(async move { welcome(welcoming, server_key).await });

        let pool = self.pool.clone();
        let registry = self.registry.clone();
        let feedback = self.feedback.clone();
        tasks.spawn(async move { subscribe(session, pool, registry, feedback).await });
    }
}

/// Greet a freshly registered device with its assigned id and the server's
/// shared secret. Failures are logged; the session stays up.
async fn welcome(session: Arc<DeviceSession>, server_key: Arc<ServerKey>) {
    let body = WelcomeMessage {
        device_id: session.id(),
        body: WELCOME_BANNER.to_string(),
        shared_secret: server_key.shared_secret().to_string(),
    };

    let message = DeviceMessage {
        kind: DeviceMessageKind::Welcome as i32,
        authentication: Some(DeviceMessageAuthentication {
            device_id: session.id(),
            message_digest: String::new(),
        }),
        payload: body.encode_to_vec(),
    };

    match session.send(message).await {
        Ok(()) => tracing::info!(device = %session.id(), "welcomed device"),
        Err(error) => tracing::warn!(device = %session.id(), %error, "unable to welcome device"),
    }
}

/// Add the session to the pool and relay everything it emits onto the
/// feedback queue until the stream ends or errors.
async fn subscribe(
    session: Arc<DeviceSession>,
    pool: Arc<SessionPool>,
    registry: Arc<dyn DeviceIndex>,
    feedback: mpsc::Sender<Vec<u8>>,
) {
    pool.insert(session.clone()).await;
    tracing::info!(device = %session.id(), "subscribed to device");

    let Some(mut source) = session.take_source().await else {
        tracing::warn!(device = %session.id(), "session arrived without a readable stream");
        unsubscribe(&pool, registry.as_ref(), &session).await;
        return;
    };

    loop {
        match source.next_frame().await {
            Some(Ok(frame)) => {
                if feedback.send(frame).await.is_err() {
                    tracing::warn!(device = %session.id(), "feedback processor is gone");
                    break;
                }
            }
            Some(Err(error)) => {
                tracing::warn!(device = %session.id(), %error, "read failed; dropping session");
                break;
            }
            None => break,
        }
    }

    tracing::info!(device = %session.id(), "closing device stream");
    unsubscribe(&pool, registry.as_ref(), &session).await;
}

/// Remove a session from service. Idempotent: the registry index entry goes
/// first, then the pool entry, then the stream itself.
async fn unsubscribe(pool: &SessionPool, registry: &dyn DeviceIndex, session: &DeviceSession) {
    let device_id = session.id();

    if let Err(error) = registry.remove_device(&device_id).await {
        tracing::warn!(device = %device_id, %error, "unable to deregister device");
    }

    pool.remove(&device_id).await;
    session.close().await;
}
