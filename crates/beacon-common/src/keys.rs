//! RSA key material for the hub and its devices.
//!
//! The server holds one process-global private key; each device registers a
//! public key, hex-encoded in PKIX/SPKI form. Outbound device messages carry
//! `hex(OAEP-SHA256-encrypt(device_key, sha256(payload)))` as their digest,
//! so only the device holding the matching private key can verify them.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{BeaconError, BeaconResult};
use crate::MESSAGE_LABEL;

/// The process-global RSA private key, loaded once at startup.
pub struct ServerKey {
    key: RsaPrivateKey,
    public_hex: String,
}

impl ServerKey {
    /// Load a PEM private key (PKCS#1 or PKCS#8) from `path`.
    pub fn from_pem_file(path: &str) -> BeaconResult<ServerKey> {
        let pem = std::fs::read_to_string(path)
            .map_err(|error| BeaconError::Server(format!("unable to read key {path}: {error}")))?;

        let key = RsaPrivateKey::from_pkcs1_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&pem))
            .map_err(|error| BeaconError::Server(format!("unable to parse key {path}: {error}")))?;

        ServerKey::from_private_key(key)
    }

    /// Wrap an already-parsed private key.
    pub fn from_private_key(key: RsaPrivateKey) -> BeaconResult<ServerKey> {
        let der = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|error| BeaconError::Server(format!("unable to encode public key: {error}")))?;

        Ok(ServerKey {
            key,
            public_hex: hex::encode(der.as_bytes()),
        })
    }

    /// Hex-encoded PKIX public key, shared with devices in welcome messages.
    pub fn shared_secret(&self) -> &str {
        &self.public_hex
    }

    /// Access the private key, e.g. to verify signed digests in tests.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// A device's public key, parsed from the hex PKIX blob it registered with.
#[derive(Clone)]
pub struct DeviceKey {
    key: RsaPublicKey,
}

impl DeviceKey {
    /// Parse a hex-encoded PKIX public key. Anything that does not resolve
    /// to an RSA public key is rejected.
    pub fn from_hex(encoded: &str) -> BeaconResult<DeviceKey> {
        let der = hex::decode(encoded).map_err(|_| BeaconError::InvalidSharedSecret)?;

        let key =
            RsaPublicKey::from_public_key_der(&der).map_err(|_| BeaconError::InvalidSharedSecret)?;

        Ok(DeviceKey { key })
    }

    /// Encrypt `data` under this key with OAEP/SHA-256 and the fixed
    /// message label.
    pub fn sign(&self, data: &[u8]) -> BeaconResult<Vec<u8>> {
        let padding = Oaep::new_with_label::<Sha256, _>(MESSAGE_LABEL);

        self.key
            .encrypt(&mut rand::thread_rng(), padding, data)
            .map_err(BeaconError::Signing)
    }

    /// Signed digest of an already-serialized payload:
    /// `sign(sha256(payload))`, hex-encoded.
    pub fn message_digest(&self, payload: &[u8]) -> BeaconResult<String> {
        let digest = Sha256::digest(payload);
        Ok(hex::encode(self.sign(&digest)?))
    }
}
