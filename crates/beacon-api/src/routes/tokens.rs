//! Device token management. Admin-only surface.

use serde::Deserialize;

use beacon_common::{BeaconError, Permission, MIN_TOKEN_NAME, USER_AUTH_HEADER};
use beacon_store::{Authority, DeviceIndex, TokenStore};

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};

#[derive(Debug, Deserialize)]
pub struct CreateTokenPayload {
    pub device_id: String,
    pub name: String,
    /// Raw permission bits; unknown bits are dropped and an empty mask
    /// falls back to viewer.
    #[serde(default)]
    pub permission: u32,
}

/// `POST /tokens` — mint a token for a device. The response is the only
/// place the token value ever appears.
pub async fn create_token(ctx: RequestContext) -> HandlerReply {
    let payload: CreateTokenPayload = match ctx.read_json() {
        Ok(payload) => payload,
        Err(error) => return Rendered::error(error).into(),
    };

    if payload.name.chars().count() < MIN_TOKEN_NAME {
        return Rendered::error(BeaconError::InvalidName(payload.name)).into();
    }

    let device = match ctx.state.registry.find_device(&payload.device_id).await {
        Ok(device) => device,
        Err(_) => return Rendered::error(BeaconError::NotFound).into(),
    };

    let bearer = ctx.header(USER_AUTH_HEADER).unwrap_or_default();

    if !ctx
        .state
        .registry
        .authorize(&device.device_id, bearer, Permission::ADMIN)
        .await
    {
        tracing::warn!(device = %device.device_id, "unauthorized token creation");
        return Rendered::error(BeaconError::InvalidToken).into();
    }

    let permission = Permission::normalize(payload.permission);

    match ctx
        .state
        .registry
        .create_token(&device.device_id, &payload.name, permission)
        .await
    {
        Ok(token) => {
            tracing::info!(device = %device.device_id, token = %token.token_id, "created token");
            Rendered::results(token).into()
        }
        Err(error) => {
            tracing::error!(device = %device.device_id, %error, "unable to create token");
            Rendered::error(error).into()
        }
    }
}

/// `GET /tokens?device_id=` — list a device's tokens, values withheld.
pub async fn list_tokens(ctx: RequestContext) -> HandlerReply {
    let query = ctx.query("device_id").unwrap_or_default();

    let device = match ctx.state.registry.find_device(query).await {
        Ok(device) => device,
        Err(_) => return Rendered::error(BeaconError::NotFound).into(),
    };

    let bearer = ctx.header(USER_AUTH_HEADER).unwrap_or_default();

    if !ctx
        .state
        .registry
        .authorize(&device.device_id, bearer, Permission::ADMIN)
        .await
    {
        tracing::warn!(device = %device.device_id, "unauthorized token listing");
        return Rendered::error(BeaconError::InvalidToken).into();
    }

    match ctx.state.registry.list_tokens(&device.device_id).await {
        Ok(tokens) => Rendered::results(tokens).into(),
        Err(error) => {
            tracing::error!(device = %device.device_id, %error, "unable to list tokens");
            Rendered::error(error).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{make_ctx, test_state};

    fn body(device_id: &str, name: &str, permission: Option<u32>) -> Vec<u8> {
        let mut payload = serde_json::json!({"device_id": device_id, "name": name});

        if let Some(bits) = permission {
            payload["permission"] = serde_json::json!(bits);
        }

        payload.to_string().into_bytes()
    }

    #[tokio::test]
    async fn admins_create_tokens_and_get_the_value_back_once() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend.registry.add_token("admin", "d-1", Permission::ADMIN);

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens",
            &[("x-user-auth", "admin")],
            body("d-1", "kitchen remote", Some(Permission::CONTROLLER.bits())),
        );

        match create_token(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                assert_eq!(rendered.results["device_id"], "d-1");
                assert_eq!(rendered.results["name"], "kitchen remote");
                assert!(rendered.results["value"].as_str().is_some());
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn unknown_permission_bits_default_to_viewer() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend.registry.add_token("admin", "d-1", Permission::ADMIN);

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens",
            &[("x-user-auth", "admin")],
            body("d-1", "weird bits", Some(1 << 12)),
        );

        match create_token(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                assert_eq!(
                    rendered.results["permission"],
                    serde_json::json!(Permission::VIEWER)
                );
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn short_names_and_non_admin_bearers_are_rejected() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend
            .registry
            .add_token("ctl", "d-1", Permission::CONTROLLER);

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens",
            &[("x-user-auth", "ctl")],
            body("d-1", "abc", None),
        );
        match create_token(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-name");
            }
            _ => panic!("expected a rendered reply"),
        }

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens",
            &[("x-user-auth", "ctl")],
            body("d-1", "long enough", None),
        );
        match create_token(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-token");
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn device_secret_administers_its_own_tokens() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "own-secret");

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens",
            &[("x-user-auth", "own-secret")],
            body("d-1", "made by device", None),
        );

        match create_token(ctx).await {
            HandlerReply::Render(rendered) => assert!(rendered.errors.is_empty()),
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn listing_withholds_token_values() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend.registry.add_token("admin", "d-1", Permission::ADMIN);
        backend
            .registry
            .add_token("other", "d-1", Permission::VIEWER);

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens?device_id=d-1",
            &[("x-user-auth", "admin")],
            Vec::new(),
        );

        match list_tokens(ctx).await {
            HandlerReply::Render(rendered) => {
                assert!(rendered.errors.is_empty());
                let listed = rendered.results.as_array().unwrap();
                assert_eq!(listed.len(), 2);
                for token in listed {
                    assert!(token.get("value").is_none());
                    assert_eq!(token["device_id"], "d-1");
                }
            }
            _ => panic!("expected a rendered reply"),
        }
    }

    #[tokio::test]
    async fn listing_requires_admin() {
        let (state, backend) = test_state();
        backend.registry.add_device("d-1", "lamp", "secret");
        backend
            .registry
            .add_token("view", "d-1", Permission::VIEWER);

        let ctx = make_ctx(
            &state,
            &[],
            "/tokens?device_id=d-1",
            &[("x-user-auth", "view")],
            Vec::new(),
        );

        match list_tokens(ctx).await {
            HandlerReply::Render(rendered) => {
                assert_eq!(rendered.errors[0].code(), "invalid-token");
            }
            _ => panic!("expected a rendered reply"),
        }
    }
}
