//! Device pre-registration and the registration upgrade.

use axum::extract::ws::{Message, WebSocket};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use beacon_common::keys::DeviceKey;
use beacon_common::validation::validate_request;
use beacon_common::{BeaconError, DEVICE_AUTH_HEADER};
use beacon_hub::session::DeviceSession;
use beacon_store::RegistrationStore;

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PreRegisterPayload {
    #[validate(length(min = 2, message = "device name too short"))]
    pub name: String,
    pub shared_secret: String,
}

/// `POST /register` — store a pending `{name, public key}` claim.
pub async fn preregister(ctx: RequestContext) -> HandlerReply {
    let payload: PreRegisterPayload = match ctx.read_json() {
        Ok(payload) => payload,
        Err(error) => return Rendered::error(error).into(),
    };

    if let Err(error) = validate_request(&payload) {
        return Rendered::error(error).into();
    }

    // The secret has to be usable as a signing key before it is stored.
    if let Err(error) = DeviceKey::from_hex(&payload.shared_secret) {
        return Rendered::error(error).into();
    }

    match ctx
        .state
        .registry
        .allocate_pending(&payload.name, &payload.shared_secret)
        .await
    {
        Ok(alloc_id) => {
            tracing::info!(name = %payload.name, alloc = %alloc_id, "pre-registered device");
            Rendered::empty().into()
        }
        Err(error) => {
            tracing::warn!(name = %payload.name, %error, "unable to pre-register device");
            Rendered::error(error).into()
        }
    }
}

/// `GET /register` — upgrade the connection and promote the matching
/// pending registration into a live session.
pub async fn register_device(mut ctx: RequestContext) -> HandlerReply {
    let Some(secret) = ctx.header(DEVICE_AUTH_HEADER).map(str::to_string) else {
        tracing::warn!("registration without a device auth header");
        return Rendered::error(BeaconError::InvalidRegistration).into();
    };

    let Some(upgrade) = ctx.take_upgrade() else {
        tracing::warn!("registration without a websocket upgrade");
        return Rendered::error(BeaconError::InvalidRegistration).into();
    };

    let state = ctx.state.clone();

    HandlerReply::Stream(upgrade.on_upgrade(move |socket| adopt_device(socket, secret, state)))
}

/// Runs once the stream is upgraded. Any failure closes the stream; the
/// device retries from scratch.
async fn adopt_device(socket: WebSocket, secret: String, state: AppState) {
    let signer = match DeviceKey::from_hex(&secret) {
        Ok(signer) => signer,
        Err(error) => {
            tracing::warn!(%error, "device presented an unusable secret");
            return close(socket).await;
        }
    };

    let device_id = Uuid::new_v4();

    let registration = match state
        .registry
        .fill_registration(&secret, &device_id.to_string())
        .await
    {
        Ok(registration) => registration,
        Err(error) => {
            tracing::warn!(%error, "no pending registration for connecting device");
            return close(socket).await;
        }
    };

    tracing::info!(device = %registration.device_id, name = %registration.name, "filled registration");

    let session = DeviceSession::from_socket(device_id, signer, socket);

    if state.registrations.send(session).await.is_err() {
        tracing::error!(device = %device_id, "control processor is gone; dropping session");
    }
}

async fn close(mut socket: WebSocket) {
    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{make_ctx, test_state};
    use std::sync::OnceLock;

    fn valid_secret() -> &'static str {
        static SECRET: OnceLock<String> = OnceLock::new();

        SECRET.get_or_init(|| {
            use rsa::pkcs8::EncodePublicKey;

            let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
            hex::encode(key.to_public_key().to_public_key_der().unwrap().as_bytes())
        })
    }

    fn body(name: &str, secret: &str) -> Vec<u8> {
        serde_json::json!({"name": name, "shared_secret": secret})
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn preregister_stores_a_pending_claim() {
        let (state, backend) = test_state();

        let ctx = make_ctx(&state, &[], "/register", &[], body("lamp", valid_secret()));

        match preregister(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                assert!(rendered.results.is_null());
            }
            _ => panic!("expected a rendered reply"),
        }

        let pending = backend.registry.pending.lock().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending.values().any(|p| p.name == "lamp"));
    }

    #[tokio::test]
    async fn preregister_rejects_short_names_and_bad_secrets() {
        let (state, backend) = test_state();

        let ctx = make_ctx(&state, &[], "/register", &[], body("x", valid_secret()));
        match preregister(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-request");
            }
            _ => panic!("expected a rendered reply"),
        }

        let ctx = make_ctx(&state, &[], "/register", &[], body("lamp", "nothex"));
        match preregister(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-shared-secret");
            }
            _ => panic!("expected a rendered reply"),
        }

        assert!(backend.registry.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preregister_rejects_duplicate_names() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "other");

        let ctx = make_ctx(&state, &[], "/register", &[], body("lamp", valid_secret()));

        match preregister(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "duplicate-name");
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn upgrade_requires_the_device_auth_header() {
        let (state, _backend) = test_state();

        let ctx = make_ctx(&state, &[], "/register", &[], Vec::new());

        match register_device(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-registration");
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn upgrade_requires_a_websocket_handshake() {
        let (state, _backend) = test_state();

        // Header present, but the request never asked for an upgrade.
        let ctx = make_ctx(
            &state,
            &[],
            "/register",
            &[("x-device-auth", "deadbeef")],
            Vec::new(),
        );

        match register_device(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-registration");
            }
            _ => panic!("expected a rendered reply"),
        }
    }
}
