use std::path::PathBuf;

use serde::Deserialize;

/// Where package content is kept on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the content store. Default: "./data/packages".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Largest blob accepted, in bytes. Default: 4 GiB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/packages")
}
fn default_max_blob_size() -> u64 {
    4 * 1024 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_blob_size: default_max_blob_size(),
        }
    }
}
