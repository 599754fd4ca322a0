//! Centralized error type for the beacon gateway.
//!
//! Uses `thiserror` for ergonomic definitions. Every variant maps onto a
//! stable kebab-case code via [`BeaconError::code`]; those codes are the only
//! thing the HTTP renderer ever shows a client. Internal messages stay in
//! the logs.

/// Core application error used across all beacon crates.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    // === Lookup / validation ===
    #[error("record not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid registration")]
    InvalidRegistration,

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("invalid or unauthorized token")]
    InvalidToken,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("name already registered: {0}")]
    DuplicateName(String),

    #[error("shared secret is not a hex-encoded RSA public key")]
    InvalidSharedSecret,

    #[error("unrecognized color shorthand: {0}")]
    InvalidColorShorthand(String),

    // === Channel bus ===
    #[error("unrecognized background channel: {0}")]
    InvalidChannel(String),

    // === Interchange ===
    #[error("undecodable interchange payload: {0}")]
    Interchange(#[from] prost::DecodeError),

    #[error("interchange message carried no authentication envelope")]
    InterchangeAuth,

    // === Infrastructure ===
    #[error("storage error: {0}")]
    Storage(#[from] redis::RedisError),

    #[error("device stream error: {0}")]
    Stream(String),

    #[error("signing error: {0}")]
    Signing(rsa::Error),

    #[error("internal error: {0}")]
    Server(String),
}

impl BeaconError {
    /// Stable error code surfaced to clients in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::InvalidRequest(_) => "invalid-request",
            Self::InvalidRegistration => "invalid-registration",
            Self::InvalidContentType(_) => "invalid-content-type",
            Self::InvalidToken => "invalid-token",
            Self::InvalidName(_) => "invalid-name",
            Self::DuplicateName(_) => "duplicate-name",
            Self::InvalidSharedSecret => "invalid-shared-secret",
            Self::InvalidColorShorthand(_) => "invalid-color-shorthand",
            Self::InvalidChannel(_) => "invalid-background-channel",
            Self::Interchange(_) => "interchange-error",
            Self::InterchangeAuth => "interchange-auth",
            Self::Storage(_) => "storage-error",
            Self::Stream(_) | Self::Signing(_) | Self::Server(_) => "server-error",
        }
    }
}

/// Convenience alias used across the workspace.
pub type BeaconResult<T> = Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_kebab_case() {
        let cases = [
            (BeaconError::NotFound, "not-found"),
            (BeaconError::InvalidToken, "invalid-token"),
            (BeaconError::InvalidSharedSecret, "invalid-shared-secret"),
            (BeaconError::InterchangeAuth, "interchange-auth"),
            (
                BeaconError::InvalidChannel("nope".into()),
                "invalid-background-channel",
            ),
            (BeaconError::Server("boom".into()), "server-error"),
        ];

        for (error, code) in cases {
            assert_eq!(error.code(), code);
        }
    }
}
