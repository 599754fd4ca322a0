//! # beacon-store
//!
//! Persistence contracts backing the gateway, factored as capability traits
//! so route handlers and background processors can be tested against mocks:
//!
//! - [`DeviceIndex`] — registered-device lookup, listing, removal
//! - [`RegistrationStore`] — pending-registration allocation and fill
//! - [`FeedbackStore`] — bounded per-device feedback history
//! - [`TokenStore`] — per-device access tokens
//! - [`Authority`] — bearer authorization over the index + token store
//!
//! [`redis::RedisRegistry`] is the one concrete object satisfying all of
//! them; [`Registry`] bundles the capabilities for injection as a single
//! trait object.

pub mod redis;

use async_trait::async_trait;

use beacon_common::interchange::FeedbackMessage;
use beacon_common::models::{DeviceRegistration, DeviceToken, TokenDetails};
use beacon_common::{BeaconResult, Permission};

pub use crate::redis::{connect, RedisRegistry};

/// Lookup, listing, and removal of registered devices.
#[async_trait]
pub trait DeviceIndex: Send + Sync {
    /// Find a registration by device id or by name. Id lookups are direct;
    /// name lookups scan the index.
    async fn find_device(&self, query: &str) -> BeaconResult<DeviceRegistration>;

    /// All registrations, in insertion order.
    async fn list_registrations(&self) -> BeaconResult<Vec<DeviceRegistration>>;

    /// Delete the registration row, feedback history, index entry, and all
    /// tokens for the device. Idempotent; token sub-deletions are
    /// best-effort.
    async fn remove_device(&self, device_id: &str) -> BeaconResult<()>;
}

/// Pre-registration hand-off between the HTTP surface and connecting devices.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Store a pending `{name, secret}` claim; returns the allocation id.
    async fn allocate_pending(&self, name: &str, secret: &str) -> BeaconResult<String>;

    /// Promote the pending row matching `secret` into a full device record
    /// under `device_id`, append the id to the device index, and delete the
    /// pending row.
    async fn fill_registration(
        &self,
        secret: &str,
        device_id: &str,
    ) -> BeaconResult<DeviceRegistration>;
}

/// Bounded, append-only per-device feedback history.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append a feedback entry, trimming the history so it never settles
    /// above [`beacon_common::MAX_FEEDBACK`] entries.
    async fn log_feedback(&self, message: FeedbackMessage) -> BeaconResult<()>;

    /// Up to `count` most recent entries, newest first.
    async fn list_feedback(
        &self,
        device_id: &str,
        count: usize,
    ) -> BeaconResult<Vec<FeedbackMessage>>;
}

/// Creation and lookup of per-device access tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Mint a token; the returned record is the only place the value is
    /// ever exposed.
    async fn create_token(
        &self,
        device_id: &str,
        name: &str,
        permission: Permission,
    ) -> BeaconResult<DeviceToken>;

    /// Look a token up by its value.
    async fn find_token(&self, value: &str) -> BeaconResult<TokenDetails>;

    /// All tokens minted for a device, values withheld.
    async fn list_tokens(&self, device_id: &str) -> BeaconResult<Vec<TokenDetails>>;
}

/// Bearer authorization: a device's own shared secret carries every
/// permission for that device; otherwise the bearer must be a token for the
/// device containing all required bits. Storage errors authorize nothing.
#[async_trait]
pub trait Authority: DeviceIndex + TokenStore {
    async fn authorize(&self, device_id: &str, bearer: &str, required: Permission) -> bool {
        if bearer.is_empty() {
            return false;
        }

        if let Ok(device) = self.find_device(device_id).await {
            if device.shared_secret == bearer {
                return true;
            }
        }

        match self.find_token(bearer).await {
            Ok(token) => token.device_id == device_id && token.permission.has(required),
            Err(_) => false,
        }
    }
}

impl<T: DeviceIndex + TokenStore> Authority for T {}

/// The full persistence surface, for injection as one object.
pub trait Registry:
    DeviceIndex + RegistrationStore + FeedbackStore + TokenStore + Authority
{
}

impl<T: DeviceIndex + RegistrationStore + FeedbackStore + TokenStore + Authority> Registry for T {}
