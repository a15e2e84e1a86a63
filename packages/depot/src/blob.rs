use chrono::{DateTime, Utc};
use common::storage::HashSums;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;

use crate::access::{Principal, can_read_owner};
use crate::entity::{package, package_blob, package_file, package_version, user};
use crate::error::{PackageError, PackageResult};
use crate::insert::{Inserted, get_or_insert};

const UNREFERENCED: &str = "NOT EXISTS (SELECT 1 FROM package_file \
     WHERE package_file.blob_id = package_blob.id)";

const SUM_SIZE: &str = "CAST(COALESCE(SUM(size), 0) AS BIGINT)";

/// Deduplicated blob rows, keyed by their digest tuple.
pub struct BlobStore<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> BlobStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> PackageResult<package_blob::Model> {
        package_blob::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageBlobNotExist)
    }

    /// Look up a blob by its content key.
    pub async fn get_by_sha256(&self, sha256: &str) -> PackageResult<package_blob::Model> {
        package_blob::Entity::find()
            .filter(package_blob::Column::HashSha256.eq(sha256.to_lowercase()))
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageBlobNotExist)
    }

    /// Blobs no file references that were created before `now - older_than`.
    pub async fn find_expired_unreferenced(
        &self,
        older_than: chrono::Duration,
    ) -> PackageResult<Vec<package_blob::Model>> {
        // An age beyond the representable range expires nothing.
        let cutoff = Utc::now()
            .checked_sub_signed(older_than)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(package_blob::Entity::find()
            .filter(package_blob::Column::CreatedAt.lt(cutoff))
            .filter(Expr::cust(UNREFERENCED))
            .order_by_asc(package_blob::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn delete_by_id(&self, id: i32) -> PackageResult<()> {
        let res = package_blob::Entity::delete_by_id(id).exec(self.conn).await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageBlobNotExist);
        }
        Ok(())
    }

    /// Bytes stored across all blobs.
    pub async fn total_size(&self) -> PackageResult<i64> {
        self.sum_size(package_blob::Entity::find()).await
    }

    /// Bytes held by blobs no file references.
    pub async fn total_unreferenced_size(&self) -> PackageResult<i64> {
        self.sum_size(package_blob::Entity::find().filter(Expr::cust(UNREFERENCED)))
            .await
    }

    async fn sum_size(&self, select: Select<package_blob::Entity>) -> PackageResult<i64> {
        let total: Option<i64> = select
            .select_only()
            .column_as(Expr::cust(SUM_SIZE), "total")
            .into_tuple()
            .one(self.conn)
            .await?;
        Ok(total.unwrap_or(0))
    }

    /// Whether `principal` may read the blob through any package that contains it.
    ///
    /// Lookup failures count as "no access".
    pub async fn can_access(&self, blob_id: i32, principal: &Principal) -> bool {
        self.readable_by(blob_id, principal).await.unwrap_or(false)
    }

    async fn readable_by(&self, blob_id: i32, principal: &Principal) -> Result<bool, DbErr> {
        let version_ids = SeaQuery::select()
            .column(package_file::Column::VersionId)
            .from(package_file::Entity)
            .and_where(package_file::Column::BlobId.eq(blob_id))
            .to_owned();
        let package_ids = SeaQuery::select()
            .column(package_version::Column::PackageId)
            .from(package_version::Entity)
            .and_where(package_version::Column::Id.in_subquery(version_ids))
            .to_owned();
        let owner_ids = SeaQuery::select()
            .column(package::Column::OwnerId)
            .from(package::Entity)
            .and_where(package::Column::Id.in_subquery(package_ids))
            .to_owned();

        let owners = user::Entity::find()
            .filter(user::Column::Id.in_subquery(owner_ids))
            .all(self.conn)
            .await?;

        for owner in &owners {
            if can_read_owner(self.conn, owner, principal).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<'a, C: ConnectionTrait + TransactionTrait> BlobStore<'a, C> {
    /// Return the blob with these digests, storing a new row if there is none.
    ///
    /// The flag is `true` when the row already existed. Concurrent callers with
    /// identical digests all get the same row and exactly one sees `false`.
    pub async fn get_or_insert(
        &self,
        hashes: &HashSums,
        size: i64,
    ) -> PackageResult<(package_blob::Model, bool)> {
        let by_digests = package_blob::Entity::find()
            .filter(package_blob::Column::HashMd5.eq(hashes.md5_hex()))
            .filter(package_blob::Column::HashSha1.eq(hashes.sha1_hex()))
            .filter(package_blob::Column::HashSha256.eq(hashes.sha256_hex()))
            .filter(package_blob::Column::HashSha512.eq(hashes.sha512_hex()));

        let candidate = package_blob::ActiveModel {
            size: Set(size),
            hash_md5: Set(hashes.md5_hex()),
            hash_sha1: Set(hashes.sha1_hex()),
            hash_sha256: Set(hashes.sha256_hex()),
            hash_sha512: Set(hashes.sha512_hex()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        Ok(match get_or_insert(self.conn, by_digests, candidate).await? {
            Inserted::Created(blob) => (blob, false),
            Inserted::Existing(blob) => (blob, true),
        })
    }
}
