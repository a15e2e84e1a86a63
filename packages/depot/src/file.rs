use chrono::Utc;
use common::PropertyType;
use sea_orm::prelude::Expr;
use sea_orm::*;

use crate::catalog::FileSearchOptions;
use crate::entity::{package_blob, package_file};
use crate::error::{PackageError, PackageResult};
use crate::insert::{Inserted, get_or_insert};
use crate::property::PropertyStore;

/// Fields of a file to be added to a version.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub version_id: i32,
    pub blob_id: i32,
    pub name: String,
    /// Empty unless several files of the version share a name.
    pub composite_key: String,
    pub is_lead: bool,
}

/// Files of package versions and the blobs they point at.
pub struct FileIndex<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> FileIndex<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Store a file, or fail with [`PackageError::DuplicatePackageFile`]
    /// carrying the file that already has this version, name and composite key.
    ///
    /// A version holds at most one lead file.
    pub async fn try_insert_file(&self, new: &NewFile) -> PackageResult<package_file::Model> {
        let lower_name = new.name.to_lowercase();
        let by_key = package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(new.version_id))
            .filter(package_file::Column::LowerName.eq(lower_name.clone()))
            .filter(package_file::Column::CompositeKey.eq(new.composite_key.clone()));

        if new.is_lead {
            self.check_lead_slot(new, &lower_name).await?;
        }

        let model = package_file::ActiveModel {
            version_id: Set(new.version_id),
            blob_id: Set(new.blob_id),
            name: Set(new.name.clone()),
            lower_name: Set(lower_name.clone()),
            composite_key: Set(new.composite_key.clone()),
            is_lead: Set(new.is_lead),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        match get_or_insert(self.conn, by_key, model).await {
            Ok(Inserted::Created(f)) => Ok(f),
            Ok(Inserted::Existing(f)) => Err(PackageError::DuplicatePackageFile(Box::new(f))),
            // A concurrent lead file under another name trips the partial unique index.
            Err(e) if new.is_lead => {
                self.check_lead_slot(new, &lower_name).await?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fail if the version already has a lead file other than `new`.
    async fn check_lead_slot(&self, new: &NewFile, lower_name: &str) -> PackageResult<()> {
        let lead = package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(new.version_id))
            .filter(package_file::Column::IsLead.eq(true))
            .one(self.conn)
            .await?;
        if let Some(lead) = lead
            && (lead.lower_name != lower_name || lead.composite_key != new.composite_key)
        {
            return Err(PackageError::InvalidArgument(format!(
                "version {} already has lead file {}",
                new.version_id, lead.name
            )));
        }
        Ok(())
    }

    pub async fn get_files_by_version_id(
        &self,
        version_id: i32,
    ) -> PackageResult<Vec<package_file::Model>> {
        Ok(package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(version_id))
            .order_by_asc(package_file::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn get_file_for_version_by_id(
        &self,
        version_id: i32,
        file_id: i32,
    ) -> PackageResult<package_file::Model> {
        package_file::Entity::find_by_id(file_id)
            .filter(package_file::Column::VersionId.eq(version_id))
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageFileNotExist)
    }

    /// Look up a file by name. `composite_key` must match exactly; pass `""`
    /// for files without one.
    pub async fn get_file_for_version_by_name(
        &self,
        version_id: i32,
        name: &str,
        composite_key: &str,
    ) -> PackageResult<package_file::Model> {
        package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(version_id))
            .filter(package_file::Column::LowerName.eq(name.to_lowercase()))
            .filter(package_file::Column::CompositeKey.eq(composite_key))
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageFileNotExist)
    }

    /// Delete a file and its properties. The blob stays.
    pub async fn delete_file_by_id(&self, id: i32) -> PackageResult<()> {
        let txn = self.conn.begin().await?;

        PropertyStore::new(&txn)
            .delete_all(PropertyType::File, id)
            .await?;
        let res = package_file::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageFileNotExist);
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn has_files(&self, version_id: i32) -> PackageResult<bool> {
        let count = package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(version_id))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Files matching `opts`, oldest first, and the total number of matches.
    pub async fn search_files(
        &self,
        opts: &FileSearchOptions,
    ) -> PackageResult<(Vec<package_file::Model>, u64)> {
        let select = package_file::Entity::find().filter(opts.condition());
        let total = select.clone().count(self.conn).await?;

        let mut select = select.order_by_asc(package_file::Column::Id);
        if let Some(p) = opts.paginator {
            select = select.offset(p.offset()).limit(p.per_page());
        }

        Ok((select.all(self.conn).await?, total))
    }

    /// Sum of blob sizes over the files matching `opts`.
    ///
    /// A blob shared by several matching files is counted once per file.
    pub async fn calculate_file_size(&self, opts: &FileSearchOptions) -> PackageResult<i64> {
        let total: Option<i64> = package_file::Entity::find()
            .select_only()
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(package_blob.size), 0) AS BIGINT)"),
                "total",
            )
            .join(
                JoinType::InnerJoin,
                package_file::Entity::belongs_to(package_blob::Entity)
                    .from(package_file::Column::BlobId)
                    .to(package_blob::Column::Id)
                    .into(),
            )
            .filter(opts.condition())
            .into_tuple()
            .one(self.conn)
            .await?;
        Ok(total.unwrap_or(0))
    }
}
