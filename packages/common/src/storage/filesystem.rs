use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{BoxReader, ContentStore};
use crate::config::StorageConfig;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Content store on the local filesystem.
///
/// Content lives at `{base_path}/{2 hex chars}/{62 hex chars}`; writes land in
/// `{base_path}/.tmp` first and are renamed into place.
pub struct FilesystemContentStore {
    base_path: PathBuf,
    max_blob_size: u64,
}

impl FilesystemContentStore {
    pub async fn new(base_path: PathBuf, max_blob_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_blob_size,
        })
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::new(config.path.clone(), config.max_blob_size).await
    }

    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.base_path
            .join(hash.shard_prefix())
            .join(hash.shard_suffix())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Copy `reader` into a temp file, returning its path and SHA-256.
    async fn spool(&self, mut reader: BoxReader) -> Result<(PathBuf, ContentHash), StorageError> {
        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path).await?;
        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        let copied: Result<(), StorageError> = async {
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                total_bytes += n as u64;
                if total_bytes > self.max_blob_size {
                    return Err(StorageError::SizeLimitExceeded {
                        actual: total_bytes,
                        limit: self.max_blob_size,
                    });
                }
                hasher.update(&buf[..n]);
                temp_file.write_all(&buf[..n]).await?;
            }
            temp_file.flush().await?;
            Ok(())
        }
        .await;
        drop(temp_file);

        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        Ok((temp_path, ContentHash::from_bytes(hasher.finalize().into())))
    }

    /// Move a spooled temp file to its final location unless identical content is already there.
    async fn commit(&self, temp_path: &Path, hash: &ContentHash) -> Result<(), StorageError> {
        let blob_path = self.blob_path(hash);
        if fs::try_exists(&blob_path).await? {
            let _ = fs::remove_file(temp_path).await;
            return Ok(());
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(temp_path, &blob_path).await {
            let _ = fs::remove_file(temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    async fn put_stream(&self, reader: BoxReader) -> Result<ContentHash, StorageError> {
        let (temp_path, hash) = self.spool(reader).await?;
        self.commit(&temp_path, &hash).await?;
        Ok(hash)
    }

    async fn put_verified(
        &self,
        reader: BoxReader,
        expected: &ContentHash,
    ) -> Result<(), StorageError> {
        let (temp_path, actual) = self.spool(reader).await?;
        if actual != *expected {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::DigestMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        self.commit(&temp_path, &actual).await
    }

    async fn get_stream(&self, hash: &ContentHash) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.blob_path(hash)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(hash.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, hash: &ContentHash) -> Result<u64, StorageError> {
        match fs::metadata(self.blob_path(hash)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(hash.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
