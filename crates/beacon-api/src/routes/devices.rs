//! Device listing and shorthand control.

use rand::Rng;

use beacon_common::interchange::ControlFrame;
use beacon_common::{BeaconError, Permission, USER_AUTH_HEADER};
use beacon_store::{Authority, DeviceIndex};

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};
use crate::routes::publish_control;

/// `GET /devices` — every registration, insertion order, secrets withheld.
pub async fn list_devices(ctx: RequestContext) -> HandlerReply {
    match ctx.state.registry.list_registrations().await {
        Ok(registrations) => Rendered::results(registrations).into(),
        Err(error) => {
            tracing::error!(%error, "unable to list registrations");
            Rendered::error(error).into()
        }
    }
}

/// `GET /devices/{uuid}/{color}` — controller-authorized one-frame update.
pub async fn update_shorthand(ctx: RequestContext) -> HandlerReply {
    let query = ctx.param("uuid").unwrap_or_default();
    let color = ctx.param("color").unwrap_or_default();

    let device = match ctx.state.registry.find_device(query).await {
        Ok(device) => device,
        Err(_) => {
            tracing::warn!(device = query, "shorthand update for unknown device");
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
        tracing::warn!(device = %device.device_id, "unauthorized shorthand update");
        return Rendered::error(BeaconError::InvalidToken).into();
    }

    let frame = match color_frame(color) {
        Ok(frame) => frame,
        Err(error) => return Rendered::error(error).into(),
    };

    tracing::debug!(
        device = %device.device_id,
        red = frame.red,
        green = frame.green,
        blue = frame.blue,
        "publishing shorthand update"
    );

    match publish_control(&ctx.state, &device.device_id, frame).await {
        Ok(()) => Rendered::empty().into(),
        Err(error) => {
            tracing::error!(%error, "unable to publish control message");
            Rendered::error(error).into()
        }
    }
}

/// Interpret a shorthand color: a single saturated channel, `off`, `rand`,
/// or a six-character hex triplet.
fn color_frame(color: &str) -> Result<ControlFrame, BeaconError> {
    let mut frame = ControlFrame::default();

    match color {
        "red" => frame.red = 255,
        "green" => frame.green = 255,
        "blue" => frame.blue = 255,
        "off" => (),
        "rand" => {
            let mut rng = rand::thread_rng();
            frame.red = rng.gen_range(0..=255);
            frame.green = rng.gen_range(0..=255);
            frame.blue = rng.gen_range(0..=255);
        }
        hex if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            frame.red = parse_channel(&hex[0..2])?;
            frame.green = parse_channel(&hex[2..4])?;
            frame.blue = parse_channel(&hex[4..6])?;
        }
        other => return Err(BeaconError::InvalidColorShorthand(other.to_string())),
    }

    Ok(frame)
}

fn parse_channel(pair: &str) -> Result<u32, BeaconError> {
    u8::from_str_radix(pair, 16)
        .map(u32::from)
        .map_err(|_| BeaconError::InvalidColorShorthand(pair.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{make_ctx, test_state};
    use beacon_common::interchange::{ControlMessage, DeviceMessage, DeviceMessageKind};
    use beacon_hub::CONTROL_CHANNEL;
    use prost::Message as _;

    fn shorthand_params<'a>(uuid: &'a str, color: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![("uuid", uuid), ("color", color)]
    }

    #[test]
    fn color_frames_cover_every_shorthand() {
        assert_eq!(
            color_frame("red").unwrap(),
            ControlFrame {
                red: 255,
                green: 0,
                blue: 0
            }
        );
        assert_eq!(
            color_frame("green").unwrap(),
            ControlFrame {
                red: 0,
                green: 255,
                blue: 0
            }
        );
        assert_eq!(color_frame("off").unwrap(), ControlFrame::default());
        assert_eq!(
            color_frame("0a1b2c").unwrap(),
            ControlFrame {
                red: 10,
                green: 27,
                blue: 44
            }
        );

        let random = color_frame("rand").unwrap();
        assert!(random.red <= 255 && random.green <= 255 && random.blue <= 255);

        assert!(matches!(
            color_frame("purple"),
            Err(BeaconError::InvalidColorShorthand(_))
        ));
    }

    #[tokio::test]
    async fn authorized_shorthand_publishes_one_control_message() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend
            .registry
            .add_token("ctl-token", "d-1", Permission::CONTROLLER);

        let ctx = make_ctx(
            &state,
            &shorthand_params("d-1", "red"),
            "/devices/d-1/red",
            &[("x-user-auth", "ctl-token")],
            Vec::new(),
        );

        match update_shorthand(ctx).await {
            HandlerReply::Render(rendered) => assert!(rendered.errors.is_empty()),
            _ => panic!("expected a rendered reply"),
        }

        let published = backend.publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, CONTROL_CHANNEL);

        let envelope = DeviceMessage::decode(published[0].1.as_slice()).unwrap();
        assert_eq!(envelope.kind(), DeviceMessageKind::Control);
        assert_eq!(
            envelope.authentication.as_ref().unwrap().device_id,
            "d-1"
        );

        let control = ControlMessage::decode(envelope.payload.as_slice()).unwrap();
        assert_eq!(
            control.frames,
            vec![ControlFrame {
                red: 255,
                green: 0,
                blue: 0
            }]
        );
    }

    #[tokio::test]
    async fn hex_shorthand_parses_bytewise() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend
            .registry
            .add_token("ctl-token", "d-1", Permission::CONTROLLER);

        let ctx = make_ctx(
            &state,
            &shorthand_params("d-1", "0a1b2c"),
            "/devices/d-1/0a1b2c",
            &[("x-user-auth", "ctl-token")],
            Vec::new(),
        );

        update_shorthand(ctx).await;

        let published = backend.publisher.published.lock().unwrap();
        let envelope = DeviceMessage::decode(published[0].1.as_slice()).unwrap();
        let control = ControlMessage::decode(envelope.payload.as_slice()).unwrap();
        assert_eq!(
            control.frames,
            vec![ControlFrame {
                red: 10,
                green: 27,
                blue: 44
            }]
        );
    }

    #[tokio::test]
    async fn missing_or_weak_tokens_are_rejected_without_publishing() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend
            .registry
            .add_token("view-token", "d-1", Permission::VIEWER);

        // No header at all.
        let ctx = make_ctx(
            &state,
            &shorthand_params("d-1", "red"),
            "/devices/d-1/red",
            &[],
            Vec::new(),
        );
        match update_shorthand(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-token");
            }
            _ => panic!("expected a rendered reply"),
        }

        // Viewer-only token.
        let ctx = make_ctx(
            &state,
            &shorthand_params("d-1", "red"),
            "/devices/d-1/red",
            &[("x-user-auth", "view-token")],
            Vec::new(),
        );
        match update_shorthand(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-token");
            }
            _ => panic!("expected a rendered reply"),
        }

        assert!(backend.publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_devices_are_not_found() {
        let (state, _backend) = test_state();

        let ctx = make_ctx(
            &state,
            &shorthand_params("ghost", "red"),
            "/devices/ghost/red",
            &[],
            Vec::new(),
        );

        match update_shorthand(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "not-found");
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn device_secret_controls_its_own_device() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "own-secret");

        let ctx = make_ctx(
            &state,
            &shorthand_params("lamp", "blue"),
            "/devices/lamp/blue",
            &[("x-user-auth", "own-secret")],
            Vec::new(),
        );

        match update_shorthand(ctx).await {
            HandlerReply::Render(rendered) => assert!(rendered.errors.is_empty()),
            _ => panic!("expected a rendered reply"),
        }

        assert_eq!(backend.publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_skips_shared_secrets() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");

        let ctx = make_ctx(&state, &[], "/devices", &[], Vec::new());

        match list_devices(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                let listed = rendered.results.as_array().unwrap();
                assert_eq!(listed.len(), 1);
                assert_eq!(listed[0]["device_id"], "d-1");
                assert!(listed[0].get("shared_secret").is_none());
            }
            _ => panic!("expected a rendered reply"),
        }
    }
}
