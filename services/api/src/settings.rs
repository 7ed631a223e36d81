//! Service settings
//!
//! Built-in defaults, overridden by an optional `linkup.toml` in the working
//! directory, overridden by `LINKUP__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use social::MediaConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub groups: GroupSettings,
    pub cache: CacheSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// RS256 public key as PEM text or a path to a PEM file
    pub public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub bucket: String,
    pub public_base_url: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSettings {
    /// Six-field cron expression for member-count reconciliation
    pub reconcile_schedule: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub username_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:3001")?
            .set_default("auth.public_key", "")?
            .set_default("media.bucket", "linkup-media")?
            .set_default(
                "media.public_base_url",
                "https://linkup-media.s3.amazonaws.com",
            )?
            .set_default("media.prefix", "uploads")?
            .set_default("groups.reconcile_schedule", "0 0 * * * *")?
            .set_default("cache.enabled", true)?
            .set_default("cache.username_ttl_seconds", 300_i64)?
            .set_default("store.backend", "postgres")?
            .add_source(File::with_name("linkup").required(false))
            .add_source(
                Environment::with_prefix("LINKUP")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

impl AuthSettings {
    /// The PEM text, reading it from disk when the setting is a path
    pub fn public_key_pem(&self) -> anyhow::Result<String> {
        let value = self.public_key.trim();
        if value.is_empty() {
            anyhow::bail!("auth.public_key is not configured");
        }
        if value.starts_with("-----BEGIN") {
            return Ok(value.to_string());
        }
        let pem = std::fs::read_to_string(value)
            .map_err(|e| anyhow::anyhow!("Failed to read public key file {}: {}", value, e))?;
        Ok(pem.trim().to_string())
    }
}

impl From<&MediaSettings> for MediaConfig {
    fn from(settings: &MediaSettings) -> Self {
        MediaConfig {
            bucket: settings.bucket.clone(),
            public_base_url: settings.public_base_url.clone(),
            prefix: settings.prefix.clone(),
        }
    }
}
