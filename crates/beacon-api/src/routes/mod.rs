//! Route handlers, one module per resource.

pub mod device_messages;
pub mod devices;
pub mod feedback;
pub mod registration;
pub mod system;
pub mod tokens;

use axum::http::Method;
use prost::Message as _;

use beacon_common::interchange::{
    ControlFrame, ControlMessage, DeviceMessage, DeviceMessageAuthentication, DeviceMessageKind,
};
use beacon_common::BeaconResult;
use beacon_hub::CONTROL_CHANNEL;

use crate::mux::RouteTable;
use crate::AppState;

/// The full route surface the supervisor registers at startup.
pub fn table() -> BeaconResult<RouteTable> {
    RouteTable::new()
        .route(Method::GET, r"^/system$", |ctx| {
            Box::pin(system::info(ctx))
        })?
        .route(Method::POST, r"^/register$", |ctx| {
            Box::pin(registration::preregister(ctx))
        })?
        .route(Method::GET, r"^/register$", |ctx| {
            Box::pin(registration::register_device(ctx))
        })?
        .route(Method::POST, r"^/device-feedback$", |ctx| {
            Box::pin(feedback::create_feedback(ctx))
        })?
        .route(Method::GET, r"^/device-feedback$", |ctx| {
            Box::pin(feedback::list_feedback(ctx))
        })?
        .route(Method::POST, r"^/tokens$", |ctx| {
            Box::pin(tokens::create_token(ctx))
        })?
        .route(Method::GET, r"^/tokens$", |ctx| {
            Box::pin(tokens::list_tokens(ctx))
        })?
        .route(Method::POST, r"^/device-messages$", |ctx| {
            Box::pin(device_messages::create_message(ctx))
        })?
        .route(
            Method::GET,
            r"^/devices/(?P<uuid>[\d\w-]+)/(?P<color>red|blue|green|off|rand|[0-9a-f]{6})$",
            |ctx| Box::pin(devices::update_shorthand(ctx)),
        )?
        .route(Method::GET, r"^/devices$", |ctx| {
            Box::pin(devices::list_devices(ctx))
        })
}

/// Wrap a single color frame in a signed-later control envelope and push it
/// onto the control channel.
pub(crate) async fn publish_control(
    state: &AppState,
    device_id: &str,
    frame: ControlFrame,
) -> BeaconResult<()> {
    let command = ControlMessage {
        frames: vec![frame],
    };

    let message = DeviceMessage {
        kind: DeviceMessageKind::Control as i32,
        authentication: Some(DeviceMessageAuthentication {
            device_id: device_id.to_string(),
            message_digest: String::new(),
        }),
        payload: command.encode_to_vec(),
    };

    state
        .publisher
        .publish(CONTROL_CHANNEL, message.encode_to_vec())
        .await
}
