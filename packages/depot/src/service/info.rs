use std::io::Cursor;

use common::PackageType;
use common::storage::{BoxReader, HashSums, MultiHasher, StorageError};
use tokio::io::AsyncReadExt;

use crate::entity::user;
use crate::metadata::Metadata;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// The account performing a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Doer {
    pub id: i32,
    /// Admins bypass quotas.
    pub is_admin: bool,
}

impl From<&user::Model> for Doer {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            is_admin: user.is_admin,
        }
    }
}

/// Identifies a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub owner_id: i32,
    pub package_type: PackageType,
    pub name: String,
    pub version: String,
}

/// A package version to create.
#[derive(Debug, Clone)]
pub struct PackageCreationInfo {
    pub info: PackageInfo,
    pub semver_compatible: bool,
    pub creator: Doer,
    pub metadata: Metadata,
    /// Set only when the package itself is new.
    pub package_properties: Vec<(String, String)>,
    /// Set only when the version is new.
    pub version_properties: Vec<(String, String)>,
}

impl PackageCreationInfo {
    pub fn new(info: PackageInfo, creator: Doer, metadata: Metadata) -> Self {
        Self {
            info,
            semver_compatible: false,
            creator,
            metadata,
            package_properties: Vec::new(),
            version_properties: Vec::new(),
        }
    }
}

/// A file to add to a version.
pub struct PackageFileCreationInfo {
    pub filename: String,
    pub composite_key: String,
    pub creator: Doer,
    pub data: PackageBlobData,
    pub is_lead: bool,
    pub properties: Vec<(String, String)>,
    /// Replace a file with the same name and composite key instead of failing.
    pub overwrite_existing: bool,
}

impl PackageFileCreationInfo {
    pub fn new(filename: impl Into<String>, creator: Doer, data: PackageBlobData) -> Self {
        Self {
            filename: filename.into(),
            composite_key: String::new(),
            creator,
            data,
            is_lead: false,
            properties: Vec::new(),
            overwrite_existing: false,
        }
    }
}

/// Uploaded content with its digests.
pub struct PackageBlobData {
    pub hashes: HashSums,
    pub size: i64,
    pub(crate) reader: BoxReader,
}

impl PackageBlobData {
    /// Content whose digests were computed while it was received.
    pub fn new(reader: BoxReader, hashes: HashSums, size: i64) -> Self {
        Self {
            hashes,
            size,
            reader,
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            hashes: HashSums::compute(&bytes),
            size: bytes.len() as i64,
            reader: Box::new(Cursor::new(bytes)),
        }
    }

    /// Read a whole stream into memory, hashing it on the way.
    pub async fn buffer(mut reader: BoxReader) -> Result<Self, StorageError> {
        let mut hasher = MultiHasher::new();
        let mut bytes = Vec::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            bytes.extend_from_slice(&buf[..n]);
        }

        let size = hasher.size() as i64;
        Ok(Self {
            hashes: hasher.finalize(),
            size,
            reader: Box::new(Cursor::new(bytes)),
        })
    }
}
