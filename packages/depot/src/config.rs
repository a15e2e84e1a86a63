use std::collections::HashMap;

use common::PackageType;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Default: 100.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Default: 5.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait when connecting or acquiring a pooled connection. Default: 8.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds before idle or long-lived pooled connections are closed.
    /// Unset keeps connections open, which in-memory SQLite databases require.
    #[serde(default)]
    pub connection_lifetime_secs: Option<u64>,
    /// Log every statement. Default: false.
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 {
    100
}
fn default_min_connections() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    8
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            timeout_secs: default_timeout_secs(),
            connection_lifetime_secs: None,
            sqlx_logging: false,
        }
    }
}

/// Package quotas. `-1` means unlimited.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Maximum number of non-internal versions per owner.
    #[serde(default = "unlimited")]
    pub total_owner_count: i64,
    /// Maximum total file size per owner, in bytes.
    #[serde(default = "unlimited")]
    pub total_owner_size: i64,
    /// Maximum size of a single upload, per package type. Missing types are unlimited.
    #[serde(default)]
    pub type_size: HashMap<PackageType, i64>,
}

fn unlimited() -> i64 {
    -1
}

impl LimitsConfig {
    pub fn size_limit_for(&self, package_type: PackageType) -> i64 {
        self.type_size.get(&package_type).copied().unwrap_or(-1)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            total_owner_count: unlimited(),
            total_owner_size: unlimited(),
            type_size: HashMap::new(),
        }
    }
}
