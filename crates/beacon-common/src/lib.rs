//! # beacon-common
//!
//! Shared foundation for the beacon gateway:
//! - Application configuration (env file + env vars + flag overrides)
//! - The central error type and its client-facing error codes
//! - Device token permission bitmasks
//! - Data models persisted by the registry
//! - Wire envelopes exchanged with devices (`interchange`)
//! - RSA key handling for signing outbound device messages

pub mod config;
pub mod error;
pub mod interchange;
pub mod keys;
pub mod models;
pub mod permissions;
pub mod validation;

pub use error::{BeaconError, BeaconResult};
pub use permissions::Permission;

/// Header carrying a device's pre-shared secret during registration.
pub const DEVICE_AUTH_HEADER: &str = "x-device-auth";

/// Header carrying a user's bearer token for authorized API calls.
pub const USER_AUTH_HEADER: &str = "x-user-auth";

/// Banner text included in every welcome message sent to a freshly
/// registered device.
pub const WELCOME_BANNER: &str = "welcome to beacon";

/// Label string mixed into the RSA-OAEP padding of signed digests.
pub const MESSAGE_LABEL: &str = "beacon";

/// Upper bound on the per-device feedback history.
pub const MAX_FEEDBACK: usize = 100;

/// Bytes of entropy behind a generated token value (hex doubles the length).
pub const TOKEN_VALUE_BYTES: usize = 20;

/// Minimum length of a device name supplied at pre-registration.
pub const MIN_DEVICE_NAME: usize = 2;

/// Minimum length of a token name.
pub const MIN_TOKEN_NAME: usize = 5;
