//! Redis-backed registry.
//!
//! Key layout:
//!
//! ```text
//! device_index                      list of device ids, insertion order
//! device_registry:<id>              hash {uuid, name, secret}
//! device_feedback:<id>              list of serialized FeedbackMessage, newest first
//! registration_requests:<alloc_id>  hash {name, secret}
//! device_token_list:<device_id>     list of token values
//! device_token:<token>              hash {uuid, name, device_id, permission}
//! ```
//!
//! All operations run on a cloned [`ConnectionManager`], which multiplexes a
//! single reconnecting connection.

use std::collections::HashMap;

use async_trait::async_trait;
use prost::Message;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use beacon_common::interchange::FeedbackMessage;
use beacon_common::keys::DeviceKey;
use beacon_common::models::{DeviceRegistration, DeviceToken, TokenDetails};
use beacon_common::{
    BeaconError, BeaconResult, Permission, MAX_FEEDBACK, MIN_DEVICE_NAME, TOKEN_VALUE_BYTES,
};

use crate::{DeviceIndex, FeedbackStore, RegistrationStore, TokenStore};

const DEVICE_INDEX_KEY: &str = "device_index";
const DEVICE_REGISTRY_PREFIX: &str = "device_registry";
const DEVICE_FEEDBACK_PREFIX: &str = "device_feedback";
const REGISTRATION_REQUEST_PREFIX: &str = "registration_requests";
const TOKEN_LIST_PREFIX: &str = "device_token_list";
const TOKEN_PREFIX: &str = "device_token";

const FIELD_UUID: &str = "uuid";
const FIELD_NAME: &str = "name";
const FIELD_SECRET: &str = "secret";
const FIELD_DEVICE_ID: &str = "device_id";
const FIELD_PERMISSION: &str = "permission";

fn registry_key(device_id: &str) -> String {
    format!("{DEVICE_REGISTRY_PREFIX}:{device_id}")
}

fn feedback_key(device_id: &str) -> String {
    format!("{DEVICE_FEEDBACK_PREFIX}:{device_id}")
}

fn pending_key(alloc_id: &str) -> String {
    format!("{REGISTRATION_REQUEST_PREFIX}:{alloc_id}")
}

fn token_list_key(device_id: &str) -> String {
    format!("{TOKEN_LIST_PREFIX}:{device_id}")
}

fn token_key(value: &str) -> String {
    format!("{TOKEN_PREFIX}:{value}")
}

/// Open the backing store at `uri` and wrap it in a [`RedisRegistry`].
pub async fn connect(uri: &str) -> BeaconResult<RedisRegistry> {
    let client = redis::Client::open(uri)?;
    let manager = ConnectionManager::new(client).await?;

    Ok(RedisRegistry::new(manager))
}

/// The one concrete object satisfying every storage capability trait.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisRegistry { conn }
    }

    async fn load_registration(&self, device_id: &str) -> BeaconResult<DeviceRegistration> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(registry_key(device_id)).await?;

        if fields.is_empty() {
            return Err(BeaconError::NotFound);
        }

        Ok(DeviceRegistration {
            device_id: fields.get(FIELD_UUID).cloned().unwrap_or_default(),
            name: fields.get(FIELD_NAME).cloned().unwrap_or_default(),
            shared_secret: fields.get(FIELD_SECRET).cloned().unwrap_or_default(),
        })
    }

    async fn device_ids(&self) -> BeaconResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(DEVICE_INDEX_KEY, 0, -1).await?)
    }
}

#[async_trait]
impl DeviceIndex for RedisRegistry {
    async fn find_device(&self, query: &str) -> BeaconResult<DeviceRegistration> {
        // Fast path: the query is a device id.
        match self.load_registration(query).await {
            Ok(found) => return Ok(found),
            Err(BeaconError::NotFound) => (),
            Err(error) => return Err(error),
        }

        // Slow path: scan the index matching on name or id. Fleets are
        // hundreds to low thousands of devices, so a linear scan holds up.
        for id in self.device_ids().await? {
            match self.load_registration(&id).await {
                Ok(found) if found.name == query || found.device_id == query => {
                    return Ok(found);
                }
                Ok(_) | Err(BeaconError::NotFound) => continue,
                Err(error) => return Err(error),
            }
        }

        Err(BeaconError::NotFound)
    }

    async fn list_registrations(&self) -> BeaconResult<Vec<DeviceRegistration>> {
        let mut registrations = Vec::new();

        for id in self.device_ids().await? {
            match self.load_registration(&id).await {
                Ok(found) => registrations.push(found),
                // Index entries can outlive their row mid-removal; skip.
                Err(BeaconError::NotFound) => continue,
                Err(error) => return Err(error),
            }
        }

        Ok(registrations)
    }

    async fn remove_device(&self, device_id: &str) -> BeaconResult<()> {
        let mut conn = self.conn.clone();

        let _: () = conn.del(registry_key(device_id)).await?;
        let _: () = conn.del(feedback_key(device_id)).await?;
        let _: () = conn.lrem(DEVICE_INDEX_KEY, 1, device_id).await?;

        // Token cleanup is best-effort; a partial failure leaves orphaned
        // hashes that no index references.
        let values: Vec<String> = match conn.lrange(token_list_key(device_id), 0, -1).await {
            Ok(values) => values,
            Err(error) => {
                tracing::warn!(device = device_id, %error, "unable to list tokens for removal");
                return Ok(());
            }
        };

        for value in values {
            if let Err(error) = conn.del::<_, ()>(token_key(&value)).await {
                tracing::warn!(device = device_id, %error, "unable to delete token");
            }
        }

        if let Err(error) = conn.del::<_, ()>(token_list_key(device_id)).await {
            tracing::warn!(device = device_id, %error, "unable to delete token list");
        }

        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for RedisRegistry {
    async fn allocate_pending(&self, name: &str, secret: &str) -> BeaconResult<String> {
        if name.chars().count() < MIN_DEVICE_NAME {
            return Err(BeaconError::InvalidRequest("device name too short".into()));
        }

        // The secret must already be a usable signing key.
        DeviceKey::from_hex(secret)?;

        let taken = self
            .list_registrations()
            .await?
            .iter()
            .any(|registration| registration.name == name);

        if taken {
            return Err(BeaconError::DuplicateName(name.to_string()));
        }

        let alloc_id = uuid::Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        let _: () = conn
            .hset_multiple(
                pending_key(&alloc_id),
                &[(FIELD_NAME, name), (FIELD_SECRET, secret)],
            )
            .await?;

        Ok(alloc_id)
    }

    async fn fill_registration(
        &self,
        secret: &str,
        device_id: &str,
    ) -> BeaconResult<DeviceRegistration> {
        let mut conn = self.conn.clone();
        let pending: Vec<String> = conn
            .keys(format!("{REGISTRATION_REQUEST_PREFIX}:*"))
            .await?;

        for key in pending {
            let fields: HashMap<String, String> = conn.hgetall(&key).await?;

            if fields.get(FIELD_SECRET).map(String::as_str) != Some(secret) {
                continue;
            }

            let name = fields.get(FIELD_NAME).cloned().unwrap_or_default();

            // One MULTI/EXEC: the device row, its index entry, and the
            // pending-row deletion land together or not at all.
            let mut promote = redis::pipe();
            promote
                .atomic()
                .hset_multiple(
                    registry_key(device_id),
                    &[
                        (FIELD_UUID, device_id),
                        (FIELD_NAME, name.as_str()),
                        (FIELD_SECRET, secret),
                    ],
                )
                .ignore()
                .rpush(DEVICE_INDEX_KEY, device_id)
                .ignore()
                .del(&key)
                .ignore();

            let _: () = promote.query_async(&mut conn).await?;

            return Ok(DeviceRegistration {
                device_id: device_id.to_string(),
                name,
                shared_secret: secret.to_string(),
            });
        }

        Err(BeaconError::NotFound)
    }
}

#[async_trait]
impl FeedbackStore for RedisRegistry {
    async fn log_feedback(&self, message: FeedbackMessage) -> BeaconResult<()> {
        let device_id = message
            .authentication
            .as_ref()
            .map(|auth| auth.device_id.clone())
            .filter(|id| !id.is_empty())
            .ok_or(BeaconError::InterchangeAuth)?;

        let mut conn = self.conn.clone();
        let registered: bool = conn.exists(registry_key(&device_id)).await?;

        if !registered {
            return Err(BeaconError::NotFound);
        }

        let key = feedback_key(&device_id);
        let length: isize = conn.llen(&key).await?;

        // Trim-then-push; a concurrent append can transiently leave the
        // list at MAX_FEEDBACK + 1, which the next insert corrects.
        if length >= MAX_FEEDBACK as isize {
            let _: () = conn.ltrim(&key, 0, MAX_FEEDBACK as isize - 2).await?;
        }

        let _: () = conn.lpush(&key, message.encode_to_vec()).await?;

        Ok(())
    }

    async fn list_feedback(
        &self,
        device_id: &str,
        count: usize,
    ) -> BeaconResult<Vec<FeedbackMessage>> {
        let count = count.clamp(1, MAX_FEEDBACK);
        let mut conn = self.conn.clone();
        let raw: Vec<Vec<u8>> = conn
            .lrange(feedback_key(device_id), 0, count as isize - 1)
            .await?;

        let mut entries = Vec::with_capacity(raw.len());

        for blob in raw {
            match FeedbackMessage::decode(blob.as_slice()) {
                Ok(message) => entries.push(message),
                Err(error) => {
                    tracing::warn!(device = device_id, %error, "skipping undecodable feedback entry");
                }
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl TokenStore for RedisRegistry {
    async fn create_token(
        &self,
        device_id: &str,
        name: &str,
        permission: Permission,
    ) -> BeaconResult<DeviceToken> {
        let token_id = uuid::Uuid::new_v4().to_string();
        let value = hex::encode(rand::thread_rng().r#gen::<[u8; TOKEN_VALUE_BYTES]>());
        let permission = Permission::normalize(permission.bits());

        let mut conn = self.conn.clone();

        let _: () = conn
            .hset_multiple(
                token_key(&value),
                &[
                    (FIELD_UUID, token_id.as_str()),
                    (FIELD_NAME, name),
                    (FIELD_DEVICE_ID, device_id),
                    (FIELD_PERMISSION, permission.bits().to_string().as_str()),
                ],
            )
            .await?;
        let _: () = conn.rpush(token_list_key(device_id), &value).await?;

        Ok(DeviceToken {
            token_id,
            device_id: device_id.to_string(),
            name: name.to_string(),
            permission,
            value,
        })
    }

    async fn find_token(&self, value: &str) -> BeaconResult<TokenDetails> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(token_key(value)).await?;

        if fields.is_empty() {
            return Err(BeaconError::NotFound);
        }

        let bits = fields
            .get(FIELD_PERMISSION)
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or_default();

        Ok(TokenDetails {
            token_id: fields.get(FIELD_UUID).cloned().unwrap_or_default(),
            device_id: fields.get(FIELD_DEVICE_ID).cloned().unwrap_or_default(),
            name: fields.get(FIELD_NAME).cloned().unwrap_or_default(),
            permission: Permission::normalize(bits),
        })
    }

    async fn list_tokens(&self, device_id: &str) -> BeaconResult<Vec<TokenDetails>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.lrange(token_list_key(device_id), 0, -1).await?;

        let mut tokens = Vec::with_capacity(values.len());

        for value in values {
            match self.find_token(&value).await {
                Ok(details) => tokens.push(details),
                Err(BeaconError::NotFound) => continue,
                Err(error) => return Err(error),
            }
        }

        Ok(tokens)
    }
}
