//! Package creation and removal flows spanning several tables and the content store.

mod info;
mod quota;

pub use info::{Doer, PackageBlobData, PackageCreationInfo, PackageFileCreationInfo, PackageInfo};

use std::sync::Arc;

use common::{PackageType, PropertyType};
use common::storage::{BoxReader, ContentHash, ContentStore};
use sea_orm::*;
use tracing::{error, info, instrument, warn};

use crate::blob::BlobStore;
use crate::catalog::{NewPackage, NewVersion, PackageCatalog, Paginator, VersionSearchOptions};
use crate::config::LimitsConfig;
use crate::entity::{package, package_file, package_version};
use crate::error::{PackageError, PackageResult};
use crate::file::{FileIndex, NewFile};
use crate::property::PropertyStore;

/// Version property holding a distribution tag such as `latest`.
pub const VERSION_TAG_PROPERTY: &str = "version.tag";

const REMOVE_ALL_PAGE_SIZE: u64 = 50;

pub struct PackageService {
    db: DatabaseConnection,
    content: Arc<dyn ContentStore>,
    limits: LimitsConfig,
}

impl PackageService {
    pub fn new(
        db: DatabaseConnection,
        content: Arc<dyn ContentStore>,
        limits: LimitsConfig,
    ) -> Self {
        Self { db, content, limits }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// Create a version with its first file. Fails with
    /// [`PackageError::DuplicatePackageVersion`] if the version exists.
    #[instrument(skip_all, fields(owner_id = pci.info.owner_id, name = %pci.info.name, version = %pci.info.version))]
    pub async fn create_package_and_add_file(
        &self,
        pci: &PackageCreationInfo,
        pfci: PackageFileCreationInfo,
    ) -> PackageResult<(package_version::Model, package_file::Model)> {
        self.create_and_add_file(pci, pfci, false).await
    }

    /// Like [`Self::create_package_and_add_file`], adding the file to the
    /// version if it exists already.
    #[instrument(skip_all, fields(owner_id = pci.info.owner_id, name = %pci.info.name, version = %pci.info.version))]
    pub async fn create_package_or_add_file_to_existing(
        &self,
        pci: &PackageCreationInfo,
        pfci: PackageFileCreationInfo,
    ) -> PackageResult<(package_version::Model, package_file::Model)> {
        self.create_and_add_file(pci, pfci, true).await
    }

    async fn create_and_add_file(
        &self,
        pci: &PackageCreationInfo,
        pfci: PackageFileCreationInfo,
        allow_duplicate: bool,
    ) -> PackageResult<(package_version::Model, package_file::Model)> {
        let txn = self.db.begin().await?;
        let mut written = None;

        let result = async {
            let (version, created) = self
                .create_package_and_version(&txn, pci, allow_duplicate)
                .await?;
            let file = self
                .add_file_to_version(&txn, &version, &pci.info, pfci, &mut written)
                .await?;
            if created {
                info!(version_id = version.id, "Created package version");
            }
            Ok((version, file))
        }
        .await;

        self.commit_or_discard(txn, result, written).await
    }

    async fn create_package_and_version(
        &self,
        txn: &DatabaseTransaction,
        pci: &PackageCreationInfo,
        allow_duplicate: bool,
    ) -> PackageResult<(package_version::Model, bool)> {
        if pci.metadata.package_type() != pci.info.package_type {
            return Err(PackageError::InvalidArgument(format!(
                "{} metadata for a {} package",
                pci.metadata.package_type(),
                pci.info.package_type
            )));
        }

        let catalog = PackageCatalog::new(txn);
        let properties = PropertyStore::new(txn);

        let new_package = NewPackage {
            owner_id: pci.info.owner_id,
            package_type: pci.info.package_type,
            name: pci.info.name.clone(),
            semver_compatible: pci.semver_compatible,
            is_internal: false,
        };
        let (package, package_created) = match catalog.try_insert_package(&new_package).await {
            Ok(p) => (p, true),
            Err(PackageError::DuplicatePackage(p)) => (*p, false),
            Err(e) => {
                error!(error = %e, "Error inserting package");
                return Err(e);
            }
        };
        if package_created {
            for (name, value) in &pci.package_properties {
                properties
                    .insert(PropertyType::Package, package.id, name, value)
                    .await?;
            }
        }

        let new_version = NewVersion {
            package_id: package.id,
            creator_id: pci.creator.id,
            version: pci.info.version.clone(),
            metadata_json: pci.metadata.encode()?,
            is_internal: false,
        };
        let (version, version_created) = match catalog.get_or_insert_version(&new_version).await {
            Ok(v) => (v, true),
            Err(PackageError::DuplicatePackageVersion(v)) if allow_duplicate => (*v, false),
            Err(e) => {
                if !e.is_duplicate() {
                    error!(error = %e, "Error inserting package version");
                }
                return Err(e);
            }
        };

        if version_created {
            self.check_count_quota(txn, &pci.creator, pci.info.owner_id)
                .await?;
            for (name, value) in &pci.version_properties {
                properties
                    .insert(PropertyType::Version, version.id, name, value)
                    .await?;
            }
        }

        Ok((version, version_created))
    }

    /// Add a file to an existing version. Fails with
    /// [`PackageError::PackageVersionNotExist`] if there is none.
    #[instrument(skip_all, fields(owner_id = info.owner_id, name = %info.name, version = %info.version))]
    pub async fn add_file_to_existing_package(
        &self,
        info: &PackageInfo,
        pfci: PackageFileCreationInfo,
    ) -> PackageResult<package_file::Model> {
        let txn = self.db.begin().await?;
        let mut written = None;

        let result = async {
            let version = PackageCatalog::new(&txn)
                .get_version_by_name_and_version(
                    info.owner_id,
                    info.package_type,
                    &info.name,
                    &info.version,
                )
                .await?;
            self.add_file_to_version(&txn, &version, info, pfci, &mut written)
                .await
        }
        .await;

        self.commit_or_discard(txn, result, written).await
    }

    /// Add a file without quota checks. Meant for versions the registry
    /// maintains itself.
    #[instrument(skip_all, fields(version_id = version.id))]
    pub async fn add_file_to_package_version_internal(
        &self,
        version: &package_version::Model,
        pfci: PackageFileCreationInfo,
    ) -> PackageResult<package_file::Model> {
        let txn = self.db.begin().await?;
        let mut written = None;
        let result = self
            .add_file_unchecked(&txn, version, pfci, &mut written)
            .await;
        self.commit_or_discard(txn, result, written).await
    }

    async fn add_file_to_version(
        &self,
        txn: &DatabaseTransaction,
        version: &package_version::Model,
        info: &PackageInfo,
        pfci: PackageFileCreationInfo,
        written: &mut Option<ContentHash>,
    ) -> PackageResult<package_file::Model> {
        self.check_size_quota(
            txn,
            &pfci.creator,
            info.owner_id,
            info.package_type,
            pfci.data.size,
        )
        .await?;
        self.add_file_unchecked(txn, version, pfci, written).await
    }

    /// Store the blob (writing content only for a new blob), then the file and
    /// its properties. `written` is set once content has been written.
    async fn add_file_unchecked(
        &self,
        txn: &DatabaseTransaction,
        version: &package_version::Model,
        pfci: PackageFileCreationInfo,
        written: &mut Option<ContentHash>,
    ) -> PackageResult<package_file::Model> {
        let PackageFileCreationInfo {
            filename,
            composite_key,
            data,
            is_lead,
            properties,
            overwrite_existing,
            ..
        } = pfci;

        let (blob, existed) = BlobStore::new(txn)
            .get_or_insert(&data.hashes, data.size)
            .await
            .inspect_err(|e| error!(error = %e, "Error inserting package blob"))?;
        if !existed {
            let key = data.hashes.content_hash();
            self.content
                .put_verified(data.reader, &key)
                .await
                .inspect_err(|e| error!(error = %e, "Error saving package blob content"))?;
            *written = Some(key);
        }

        let files = FileIndex::new(txn);
        if overwrite_existing {
            match files
                .get_file_for_version_by_name(version.id, &filename, &composite_key)
                .await
            {
                Ok(existing) if existing.blob_id == blob.id => return Ok(existing),
                Ok(existing) => files.delete_file_by_id(existing.id).await?,
                Err(PackageError::PackageFileNotExist) => {}
                Err(e) => return Err(e),
            }
        }

        let file = files
            .try_insert_file(&NewFile {
                version_id: version.id,
                blob_id: blob.id,
                name: filename,
                composite_key,
                is_lead,
            })
            .await
            .inspect_err(|e| {
                if !e.is_duplicate() {
                    error!(error = %e, "Error inserting package file");
                }
            })?;

        let store = PropertyStore::new(txn);
        for (name, value) in &properties {
            store
                .insert(PropertyType::File, file.id, name, value)
                .await?;
        }

        Ok(file)
    }

    /// Commit on success. On failure the transaction rolls back and content
    /// written for a new blob is deleted again.
    async fn commit_or_discard<T>(
        &self,
        txn: DatabaseTransaction,
        result: PackageResult<T>,
        written: Option<ContentHash>,
    ) -> PackageResult<T> {
        let result = match result {
            Ok(value) => txn.commit().await.map(|_| value).map_err(PackageError::from),
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Failed to roll back package transaction");
                }
                Err(e)
            }
        };

        if result.is_err()
            && let Some(key) = written
            && let Err(e) = self.content.delete(&key).await
        {
            error!(sha256 = %key, error = %e, "Error deleting package blob content");
        }
        result
    }

    /// The internal version `name@version` of the owner, created on first use.
    #[instrument(skip(self))]
    pub async fn get_or_create_internal_package_version(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
        version: &str,
    ) -> PackageResult<package_version::Model> {
        let txn = self.db.begin().await?;
        let catalog = PackageCatalog::new(&txn);

        let new_package = NewPackage {
            owner_id,
            package_type,
            name: name.to_string(),
            semver_compatible: false,
            is_internal: true,
        };
        let package = match catalog.try_insert_package(&new_package).await {
            Ok(p) => p,
            Err(PackageError::DuplicatePackage(p)) => *p,
            Err(e) => return Err(e),
        };

        let new_version = NewVersion {
            package_id: package.id,
            creator_id: owner_id,
            version: version.to_string(),
            metadata_json: "null".to_string(),
            is_internal: true,
        };
        let version = match catalog.get_or_insert_version(&new_version).await {
            Ok(v) => v,
            Err(PackageError::DuplicatePackageVersion(v)) => *v,
            Err(e) => return Err(e),
        };

        txn.commit().await?;
        Ok(version)
    }

    #[instrument(skip_all, fields(owner_id = info.owner_id, name = %info.name, version = %info.version))]
    pub async fn remove_package_version_by_name_and_version(
        &self,
        info: &PackageInfo,
    ) -> PackageResult<()> {
        let version = PackageCatalog::new(&self.db)
            .get_version_by_name_and_version(
                info.owner_id,
                info.package_type,
                &info.name,
                &info.version,
            )
            .await?;
        self.remove_package_version(&version).await
    }

    /// Delete a version with its files and properties, and the package too
    /// if no version is left.
    #[instrument(skip_all, fields(version_id = version.id))]
    pub async fn remove_package_version(
        &self,
        version: &package_version::Model,
    ) -> PackageResult<()> {
        let txn = self.db.begin().await?;

        PackageCatalog::new(&txn)
            .delete_version_by_id(version.id)
            .await?;
        remove_package_if_empty(&txn, version.package_id).await?;

        txn.commit().await?;
        info!("Deleted package version");
        Ok(())
    }

    /// Delete a file, then its version if that was the last file.
    #[instrument(skip_all, fields(file_id = file.id, version_id = file.version_id))]
    pub async fn remove_package_file_and_version_if_unreferenced(
        &self,
        file: &package_file::Model,
    ) -> PackageResult<()> {
        let txn = self.db.begin().await?;
        let catalog = PackageCatalog::new(&txn);

        FileIndex::new(&txn).delete_file_by_id(file.id).await?;
        if !catalog.has_version_file_references(file.version_id).await? {
            let version = catalog.get_version_by_id(file.version_id).await?;
            catalog.delete_version_by_id(version.id).await?;
            remove_package_if_empty(&txn, version.package_id).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Delete a version with its properties, files and file properties.
    /// The package stays even if it has no version left.
    pub async fn delete_package_version_and_references(
        &self,
        version: &package_version::Model,
    ) -> PackageResult<()> {
        PackageCatalog::new(&self.db)
            .delete_version_by_id(version.id)
            .await
    }

    /// Delete every package of an owner, internal ones included. Returns the
    /// number of versions deleted.
    #[instrument(skip(self))]
    pub async fn remove_all_packages(&self, owner_id: i32) -> PackageResult<u64> {
        let catalog = PackageCatalog::new(&self.db);
        let opts = VersionSearchOptions {
            owner_id: Some(owner_id),
            paginator: Some(Paginator::new(1, REMOVE_ALL_PAGE_SIZE)),
            ..Default::default()
        };

        let mut count = 0;
        loop {
            let (versions, _) = catalog.search_versions(&opts).await?;
            if versions.is_empty() {
                break;
            }
            for version in versions {
                catalog.delete_version_by_id(version.id).await.inspect_err(|e| {
                    error!(version_id = version.id, error = %e, "Unable to delete package version")
                })?;
                count += 1;
            }
        }

        let packages = package::Entity::find()
            .filter(package::Column::OwnerId.eq(owner_id))
            .all(&self.db)
            .await?;
        for package in packages {
            catalog.delete_package_by_id(package.id).await?;
        }

        info!(count, "Removed all packages of owner");
        Ok(count)
    }

    /// Open a file's content. Downloading the lead file counts as a download
    /// of its version.
    #[instrument(skip_all, fields(file_id = file.id))]
    pub async fn open_file_for_download(
        &self,
        file: &package_file::Model,
    ) -> PackageResult<BoxReader> {
        let blob = BlobStore::new(&self.db).get_by_id(file.blob_id).await?;
        let key = ContentHash::from_hex(&blob.hash_sha256)?;
        let reader = self.content.get_stream(&key).await?;

        if file.is_lead
            && let Err(e) = PackageCatalog::new(&self.db)
                .increment_download_counter(file.version_id)
                .await
        {
            error!(version_id = file.version_id, error = %e, "Error incrementing download counter");
        }
        Ok(reader)
    }

    /// Look up a file of a regular version by name and open it.
    pub async fn open_file_for_download_by_name(
        &self,
        info: &PackageInfo,
        filename: &str,
        composite_key: &str,
    ) -> PackageResult<(BoxReader, package_file::Model)> {
        let version = PackageCatalog::new(&self.db)
            .get_version_by_name_and_version(
                info.owner_id,
                info.package_type,
                &info.name,
                &info.version,
            )
            .await?;
        let file = FileIndex::new(&self.db)
            .get_file_for_version_by_name(version.id, filename, composite_key)
            .await?;
        let reader = self.open_file_for_download(&file).await?;
        Ok((reader, file))
    }

    /// Point `tag` at `version`, moving it off whichever version of the same
    /// package carried it.
    #[instrument(skip_all, fields(version_id = version.id, tag))]
    pub async fn set_version_tag(
        &self,
        version: &package_version::Model,
        tag: &str,
    ) -> PackageResult<()> {
        let txn = self.db.begin().await?;

        remove_tag(&txn, version.package_id, tag).await?;
        PropertyStore::new(&txn)
            .insert(PropertyType::Version, version.id, VERSION_TAG_PROPERTY, tag)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Remove `tag` from every version of a package.
    pub async fn delete_version_tag(&self, package_id: i32, tag: &str) -> PackageResult<()> {
        remove_tag(&self.db, package_id, tag).await?;
        Ok(())
    }

    /// The version of a package carrying `tag`.
    pub async fn get_tagged_version(
        &self,
        package_id: i32,
        tag: &str,
    ) -> PackageResult<package_version::Model> {
        let (mut versions, _) = PackageCatalog::new(&self.db)
            .search_versions(&VersionSearchOptions {
                package_id: Some(package_id),
                properties: vec![(VERSION_TAG_PROPERTY.to_string(), tag.to_string())],
                ..Default::default()
            })
            .await?;
        versions.pop().ok_or(PackageError::PackageVersionNotExist)
    }
}

async fn remove_tag<C: ConnectionTrait>(
    conn: &C,
    package_id: i32,
    tag: &str,
) -> PackageResult<u64> {
    let version_ids: Vec<i32> = package_version::Entity::find()
        .select_only()
        .column(package_version::Column::Id)
        .filter(package_version::Column::PackageId.eq(package_id))
        .into_tuple()
        .all(conn)
        .await?;
    PropertyStore::new(conn)
        .delete_by_name_and_value(PropertyType::Version, &version_ids, VERSION_TAG_PROPERTY, tag)
        .await
}

async fn remove_package_if_empty<C>(conn: &C, package_id: i32) -> PackageResult<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    let remaining = package_version::Entity::find()
        .filter(package_version::Column::PackageId.eq(package_id))
        .count(conn)
        .await?;
    if remaining == 0 {
        PackageCatalog::new(conn)
            .delete_package_by_id(package_id)
            .await?;
    }
    Ok(())
}
