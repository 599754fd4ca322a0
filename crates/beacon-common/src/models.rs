//! Records persisted by the device registry.

use serde::Serialize;

use crate::permissions::Permission;

/// A fully registered device. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub name: String,
    /// Hex-encoded PKIX/RSA public key presented by the device. Never
    /// serialized into client responses.
    #[serde(skip_serializing)]
    pub shared_secret: String,
}

/// An unclaimed `{name, public key}` pair stored by the pre-registration
/// endpoint and consumed when the device first connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub name: String,
    pub shared_secret: String,
}

/// A freshly created device token, value included. Only the creation
/// response ever carries the value.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceToken {
    pub token_id: String,
    pub device_id: String,
    pub name: String,
    pub permission: Permission,
    pub value: String,
}

/// Listable token details; the secret value is withheld.
#[derive(Debug, Clone, Serialize)]
pub struct TokenDetails {
    pub token_id: String,
    pub device_id: String,
    pub name: String,
    pub permission: Permission,
}

impl From<DeviceToken> for TokenDetails {
    fn from(token: DeviceToken) -> Self {
        TokenDetails {
            token_id: token.token_id,
            device_id: token.device_id,
            name: token.name,
            permission: token.permission,
        }
    }
}
