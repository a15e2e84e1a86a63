use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::*;

use crate::entity::package_blob_upload;
use crate::error::{PackageError, PackageResult};

const UPLOAD_ID_LENGTH: usize = 25;
const UPLOAD_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_ID_ATTEMPTS: usize = 3;

/// Random upload id. Whoever knows it may resume the upload.
pub fn generate_upload_id() -> String {
    let mut rng = rand::rng();
    (0..UPLOAD_ID_LENGTH)
        .map(|_| UPLOAD_ID_ALPHABET[rng.random_range(0..UPLOAD_ID_ALPHABET.len())] as char)
        .collect()
}

/// Bookkeeping for resumable uploads.
pub struct UploadTracker<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> UploadTracker<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Start an upload with no bytes received.
    pub async fn create(&self) -> PackageResult<package_blob_upload::Model> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let model = package_blob_upload::ActiveModel {
                id: Set(generate_upload_id()),
                bytes_received: Set(0),
                hash_state: Set(Vec::new()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            match model.insert(self.conn).await {
                Ok(upload) => return Ok(upload),
                Err(e)
                    if attempt < MAX_ID_ATTEMPTS
                        && matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> PackageResult<package_blob_upload::Model> {
        package_blob_upload::Entity::find_by_id(id.to_string())
            .one(self.conn)
            .await?
            .ok_or(PackageError::BlobUploadNotExist)
    }

    /// Record progress: bytes received so far and the hasher checkpoint.
    pub async fn update(
        &self,
        upload: &package_blob_upload::Model,
    ) -> PackageResult<package_blob_upload::Model> {
        let active = package_blob_upload::ActiveModel {
            id: Set(upload.id.clone()),
            bytes_received: Set(upload.bytes_received),
            hash_state: Set(upload.hash_state.clone()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        match active.update(self.conn).await {
            Ok(updated) => Ok(updated),
            Err(DbErr::RecordNotUpdated) => Err(PackageError::BlobUploadNotExist),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_by_id(&self, id: &str) -> PackageResult<()> {
        let res = package_blob_upload::Entity::delete_by_id(id.to_string())
            .exec(self.conn)
            .await?;
        if res.rows_affected == 0 {
            return Err(PackageError::BlobUploadNotExist);
        }
        Ok(())
    }

    /// Uploads without progress since `now - older_than`.
    pub async fn find_expired(
        &self,
        older_than: chrono::Duration,
    ) -> PackageResult<Vec<package_blob_upload::Model>> {
        // An age beyond the representable range expires nothing.
        let cutoff = Utc::now()
            .checked_sub_signed(older_than)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(package_blob_upload::Entity::find()
            .filter(package_blob_upload::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(package_blob_upload::Column::UpdatedAt)
            .all(self.conn)
            .await?)
    }
}
