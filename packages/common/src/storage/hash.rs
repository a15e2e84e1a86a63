use std::fmt;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use super::error::StorageError;

/// SHA-256 digest used as the key of stored content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash `data` with SHA-256.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        decode_fixed::<32>("sha256", s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First byte as hex, used as the shard directory name.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Remaining 31 bytes as hex, used as the file name inside the shard.
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The four digests registries publish for every blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HashSums {
    pub md5: [u8; 16],
    pub sha1: [u8; 20],
    pub sha256: [u8; 32],
    pub sha512: [u8; 64],
}

impl HashSums {
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = MultiHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Build from hex digests announced by a client, validating each length.
    pub fn from_hex(
        md5: &str,
        sha1: &str,
        sha256: &str,
        sha512: &str,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            md5: decode_fixed("md5", md5)?,
            sha1: decode_fixed("sha1", sha1)?,
            sha256: decode_fixed("sha256", sha256)?,
            sha512: decode_fixed("sha512", sha512)?,
        })
    }

    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    pub fn sha1_hex(&self) -> String {
        hex::encode(self.sha1)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    pub fn sha512_hex(&self) -> String {
        hex::encode(self.sha512)
    }

    /// Key under which the content is stored.
    pub fn content_hash(&self) -> ContentHash {
        ContentHash(self.sha256)
    }
}

/// Incremental MD5/SHA-1/SHA-256/SHA-512 hasher that also counts bytes.
#[derive(Clone, Default)]
pub struct MultiHasher {
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
    sha512: Sha512,
    size: u64,
}

impl MultiHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
        self.size += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> HashSums {
        let mut sums = HashSums {
            md5: [0; 16],
            sha1: [0; 20],
            sha256: [0; 32],
            sha512: [0; 64],
        };
        sums.md5.copy_from_slice(&self.md5.finalize());
        sums.sha1.copy_from_slice(&self.sha1.finalize());
        sums.sha256.copy_from_slice(&self.sha256.finalize());
        sums.sha512.copy_from_slice(&self.sha512.finalize());
        sums
    }
}

fn decode_fixed<const N: usize>(algorithm: &str, s: &str) -> Result<[u8; N], StorageError> {
    if s.len() != N * 2 {
        return Err(StorageError::InvalidHash(format!(
            "{algorithm}: expected {} hex characters, got {}",
            N * 2,
            s.len()
        )));
    }

    let bytes = hex::decode(s)
        .map_err(|e| StorageError::InvalidHash(format!("{algorithm}: invalid hex: {e}")))?;

    bytes
        .try_into()
        .map_err(|_| StorageError::InvalidHash(format!("{algorithm}: decoded to wrong length")))
}
