//! Application configuration loaded from environment variables and env files.
//!
//! Config precedence: flag overrides > env vars > env file > defaults.

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Flag-style overrides collected by the binary before [`init`] runs.
///
/// Every field is optional; `None` leaves the layered configuration value in
/// place.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub redis_uri: Option<String>,
    pub private_key: Option<String>,
}

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("config not initialized; call beacon_common::config::init() first")
}

/// Initialize the global configuration.
///
/// `env_file` points at an optional `key=value` file loaded before the
/// environment source is read; a missing file is not an error.
pub fn init(
    env_file: &str,
    overrides: Overrides,
) -> Result<&'static AppConfig, config::ConfigError> {
    let _ = dotenvy::from_filename(env_file);

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.hostname", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("redis.uri", "redis://0.0.0.0:6379")?
        .set_default("keys.private_key", ".keys/private.pem")?
        // Environment variables (BEACON_SERVER__PORT, BEACON_REDIS__URI, etc.)
        .add_source(
            config::Environment::with_prefix("BEACON")
                .separator("__")
                .try_parsing(true),
        )
        // Flag overrides win over everything
        .set_override_option("server.hostname", overrides.hostname)?
        .set_override_option("server.port", overrides.port.map(i64::from))?
        .set_override_option("redis.uri", overrides.redis_uri)?
        .set_override_option("keys.private_key", overrides.private_key)?
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub keys: KeyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    pub hostname: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Connection URI of the backing store.
    pub uri: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeyConfig {
    /// Path to the server's RSA private key in PEM form.
    pub private_key: String,
}
