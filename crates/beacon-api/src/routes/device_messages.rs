//! Direct device-message creation.

use serde::Deserialize;
use validator::Validate;

use beacon_common::interchange::ControlFrame;
use beacon_common::validation::validate_request;
use beacon_common::{BeaconError, Permission, USER_AUTH_HEADER};
use beacon_store::{Authority, DeviceIndex};

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};
use crate::routes::publish_control;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessagePayload {
    pub device_id: String,
    #[validate(range(max = 255, message = "red channel out of range"))]
    pub red: u32,
    #[validate(range(max = 255, message = "green channel out of range"))]
    pub green: u32,
    #[validate(range(max = 255, message = "blue channel out of range"))]
    pub blue: u32,
}

/// `POST /device-messages` — controller-authorized single-frame command.
pub async fn create_message(ctx: RequestContext) -> HandlerReply {
    let payload: CreateMessagePayload = match ctx.read_json() {
        Ok(payload) => payload,
        Err(error) => return Rendered::error(error).into(),
    };

    if let Err(error) = validate_request(&payload) {
        return Rendered::error(error).into();
    }

    let device = match ctx.state.registry.find_device(&payload.device_id).await {
        Ok(device) => device,
        Err(_) => {
            tracing::warn!(device = %payload.device_id, "message for unknown device");
            return Rendered::error(BeaconError::NotFound).into();
        }
    };

    let bearer = ctx.header(USER_AUTH_HEADER).unwrap_or_default();

    if !ctx
        .state
        .registry
        .authorize(&device.device_id, bearer, Permission::CONTROLLER)
        .await
    {
        tracing::warn!(device = %device.device_id, "unauthorized device message");
        return Rendered::error(BeaconError::InvalidToken).into();
    }

    let frame = ControlFrame {
        red: payload.red,
        green: payload.green,
        blue: payload.blue,
    };

    match publish_control(&ctx.state, &device.device_id, frame).await {
        Ok(()) => Rendered::empty().into(),
        Err(error) => {
            tracing::error!(%error, "unable to publish device message");
            Rendered::error(error).into()
        }
    }
}
