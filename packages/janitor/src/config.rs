use common::config::StorageConfig;
use config::{Config, ConfigError, Environment, File};
use depot::{DatabaseConfig, LimitsConfig};
use serde::Deserialize;

/// Sweep schedule and expiry windows.
#[derive(Debug, Deserialize, Clone)]
pub struct JanitorConfig {
    /// Seconds between sweeps. Default: 3600.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Seconds an upload may go without progress before it is dropped. Default: 86400.
    #[serde(default = "default_upload_ttl_secs")]
    pub upload_ttl_secs: i64,
    /// Seconds an unreferenced blob is kept around. Default: 3600.
    #[serde(default = "default_blob_ttl_secs")]
    pub blob_ttl_secs: i64,
    /// Skip cleanup rules and only expire uploads and blobs. Default: false.
    #[serde(default)]
    pub skip_rules: bool,
}

fn default_interval_secs() -> u64 {
    3600
}
fn default_upload_ttl_secs() -> i64 {
    24 * 3600
}
fn default_blob_ttl_secs() -> i64 {
    3600
}

impl JanitorConfig {
    pub fn upload_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.upload_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn blob_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.blob_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            upload_ttl_secs: default_upload_ttl_secs(),
            blob_ttl_secs: default_blob_ttl_secs(),
            skip_rules: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub janitor: JanitorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("DEPOT_CONFIG").unwrap_or_else(|_| "config/janitor".to_string());

        let s = Config::builder()
            .set_default("database.url", "sqlite://depot.db?mode=rwc")?
            .set_default("janitor.interval_secs", default_interval_secs() as i64)?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("DEPOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
