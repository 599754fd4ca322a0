//! # beacon
//!
//! Hub supervisor: loads configuration and the server key, connects the
//! registry, spawns the control and feedback processors, serves the HTTP
//! ingress, and coordinates graceful shutdown.
//!
//! Shutdown order on SIGINT/SIGTERM:
//! 1. one kill token to each processor,
//! 2. graceful HTTP stop (in-flight handlers drain),
//! 3. wait for both processors,
//! 4. exit.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, watch};

use beacon_api::{build_router, AppState};
use beacon_common::config::{self, Overrides};
use beacon_common::keys::ServerKey;
use beacon_hub::{ChannelBus, ControlProcessor, FeedbackProcessor};
use beacon_store::Registry;

/// Gateway for long-lived device streams and the clients that control them.
#[derive(Debug, Parser)]
#[command(name = "beacon", version)]
struct Flags {
    /// TCP port for the HTTP listener
    #[arg(long)]
    port: Option<u16>,

    /// Bind address for the HTTP listener
    #[arg(long)]
    hostname: Option<String>,

    /// Backing store URI
    #[arg(long)]
    redisuri: Option<String>,

    /// Path to the server's RSA private key (PEM)
    #[arg(long = "private-key")]
    private_key: Option<String>,

    /// Optional key=value environment file
    #[arg(long, default_value = ".env")]
    envfile: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();

    let config = config::init(
        &flags.envfile,
        Overrides {
            hostname: flags.hostname,
            port: flags.port,
            redis_uri: flags.redisuri,
            private_key: flags.private_key,
        },
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=debug,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting beacon");

    let server_key = Arc::new(ServerKey::from_pem_file(&config.keys.private_key)?);
    tracing::info!(path = %config.keys.private_key, "server key loaded");

    let registry = Arc::new(beacon_store::connect(&config.redis.uri).await?);
    tracing::info!(uri = %config.redis.uri, "registry connected");

    // === Channel bus & background processors ===
    let (bus, receivers) = ChannelBus::new();
    let (control_kill, control_kill_rx) = mpsc::channel(1);
    let (feedback_kill, feedback_kill_rx) = mpsc::channel(1);

    let control = ControlProcessor::new(
        receivers.control,
        receivers.registrations,
        control_kill_rx,
        bus.feedback_sender(),
        registry.clone(),
        server_key,
    );
    let feedback = FeedbackProcessor::new(receivers.feedback, feedback_kill_rx, registry.clone());

    let control_handle = tokio::spawn(control.run());
    let feedback_handle = tokio::spawn(feedback.run());

    // === HTTP ingress ===
    let state = AppState {
        registry: registry.clone() as Arc<dyn Registry>,
        publisher: Arc::new(bus.clone()),
        registrations: bus.registrations(),
    };

    let router = build_router(state, beacon_api::routes::table()?);

    let address = SocketAddr::new(config.server.hostname.parse()?, config.server.port);
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(%address, "listening");

    // === Signal handling ===
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");

        if control_kill.send(()).await.is_err() {
            tracing::warn!("control processor already gone");
        }
        if feedback_kill.send(()).await.is_err() {
            tracing::warn!("feedback processor already gone");
        }

        let _ = shutdown_tx.send(true);
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
        })
        .await?;

    tracing::info!("http server stopped; waiting for processors");

    control_handle.await?;
    feedback_handle.await?;

    tracing::info!("beacon stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("unable to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("unable to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
