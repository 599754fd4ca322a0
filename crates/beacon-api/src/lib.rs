//! # beacon-api
//!
//! HTTP ingress for the beacon gateway. Requests are matched by the
//! [`mux::RouteTable`] rather than the framework router: every request
//! falls through to one dispatcher, which builds a [`context::RequestContext`],
//! invokes the matched handler, and renders the uniform JSON envelope.

pub mod context;
pub mod mux;
pub mod render;
pub mod routes;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request, State};
use axum::response::Response;
use axum::Router;
use tokio::sync::mpsc;

use beacon_common::BeaconError;
use beacon_hub::session::DeviceSession;
use beacon_hub::Publisher;
use beacon_store::Registry;

use context::RequestContext;
use mux::RouteTable;
use render::{render, HandlerReply, Rendered};

/// Largest request body the ingress will collect.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Shared application state available to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn Registry>,
    /// Channel-bus seam; handlers publish serialized device messages here.
    pub publisher: Arc<dyn Publisher>,
    /// Hand-off queue for freshly upgraded device sessions.
    pub registrations: mpsc::Sender<DeviceSession>,
}

struct Ingress {
    state: AppState,
    table: RouteTable,
    version: &'static str,
}

/// Build the complete ingress router: one fallback dispatcher behind the
/// usual tracing and CORS layers.
pub fn build_router(state: AppState, table: RouteTable) -> Router {
    let ingress = Arc::new(Ingress {
        state,
        table,
        version: env!("CARGO_PKG_VERSION"),
    });

    Router::new()
        .fallback(dispatch)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ingress)
}

async fn dispatch(State(ingress): State<Arc<Ingress>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(%method, %path, "dispatching request");

    let Some((handler, params)) = ingress.table.match_request(&method, &path) else {
        return render(Rendered::error(BeaconError::NotFound).into(), ingress.version);
    };

    let (mut parts, body) = request.into_parts();
    let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &()).await.ok();

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(%error, "unable to collect request body");
            return render(
                Rendered::error(BeaconError::InvalidRequest("unreadable body".into())).into(),
                ingress.version,
            );
        }
    };

    let ctx = RequestContext::new(
        ingress.state.clone(),
        params,
        &parts.uri,
        parts.headers,
        body,
        upgrade,
    );

    let reply: HandlerReply = handler(ctx).await;
    render(reply, ingress.version)
}
