use chrono::Utc;
use common::{PackageType, PropertyType};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;

use super::PackageCatalog;
use super::search::VersionSearchOptions;
use crate::entity::{package, package_file, package_version};
use crate::error::{PackageError, PackageResult};
use crate::insert::{Inserted, get_or_insert};
use crate::property::PropertyStore;

/// A version is the latest of its package when no sibling of the same kind
/// sorts after it. Compares raw strings, so "9" beats "10".
const NO_NEWER_SIBLING: &str = "NOT EXISTS (SELECT 1 FROM package_version newer \
     WHERE newer.package_id = package_version.package_id \
     AND newer.is_internal = package_version.is_internal \
     AND newer.lower_version > package_version.lower_version)";

/// Fields of a version to be created.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub package_id: i32,
    pub creator_id: i32,
    pub version: String,
    /// Serialized metadata, stored as given.
    pub metadata_json: String,
    pub is_internal: bool,
}

/// Parse a version string as a semantic version, accepting a leading `v`.
pub fn parse_semver(version: &str) -> Option<semver::Version> {
    let v = version.trim();
    semver::Version::parse(v.strip_prefix('v').unwrap_or(v)).ok()
}

impl<'a, C: ConnectionTrait + TransactionTrait> PackageCatalog<'a, C> {
    /// Store a version, or fail with [`PackageError::DuplicatePackageVersion`]
    /// carrying the row that already has this package and version string.
    pub async fn get_or_insert_version(
        &self,
        new: &NewVersion,
    ) -> PackageResult<package_version::Model> {
        let lower_version = new.version.to_lowercase();
        let by_key = package_version::Entity::find()
            .filter(package_version::Column::PackageId.eq(new.package_id))
            .filter(package_version::Column::LowerVersion.eq(lower_version.clone()));

        let model = package_version::ActiveModel {
            package_id: Set(new.package_id),
            creator_id: Set(new.creator_id),
            version: Set(new.version.clone()),
            lower_version: Set(lower_version),
            metadata_json: Set(new.metadata_json.clone()),
            is_internal: Set(new.is_internal),
            download_count: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        match get_or_insert(self.conn, by_key, model).await? {
            Inserted::Created(v) => Ok(v),
            Inserted::Existing(v) => Err(PackageError::DuplicatePackageVersion(Box::new(v))),
        }
    }

    /// Persist changes to the mutable fields of a version.
    ///
    /// Renaming onto a version string the package already has fails with
    /// [`PackageError::DuplicatePackageVersion`] carrying that row.
    pub async fn update_version(
        &self,
        version: &package_version::Model,
    ) -> PackageResult<package_version::Model> {
        let lower_version = version.version.to_lowercase();
        let active = package_version::ActiveModel {
            id: Set(version.id),
            creator_id: Set(version.creator_id),
            version: Set(version.version.clone()),
            lower_version: Set(lower_version.clone()),
            metadata_json: Set(version.metadata_json.clone()),
            is_internal: Set(version.is_internal),
            ..Default::default()
        };

        // Savepoint, so a unique violation leaves the caller's transaction usable.
        let txn = self.conn.begin().await?;
        match active.update(&txn).await {
            Ok(updated) => {
                txn.commit().await?;
                Ok(updated)
            }
            Err(DbErr::RecordNotUpdated) => Err(PackageError::PackageVersionNotExist),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                let existing = package_version::Entity::find()
                    .filter(package_version::Column::PackageId.eq(version.package_id))
                    .filter(package_version::Column::LowerVersion.eq(lower_version))
                    .one(self.conn)
                    .await?;
                match existing {
                    Some(v) => Err(PackageError::DuplicatePackageVersion(Box::new(v))),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn increment_download_counter(&self, version_id: i32) -> PackageResult<()> {
        let res = package_version::Entity::update_many()
            .col_expr(
                package_version::Column::DownloadCount,
                Expr::col(package_version::Column::DownloadCount).add(1),
            )
            .filter(package_version::Column::Id.eq(version_id))
            .exec(self.conn)
            .await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageVersionNotExist);
        }
        Ok(())
    }

    pub async fn get_version_by_id(&self, id: i32) -> PackageResult<package_version::Model> {
        package_version::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageVersionNotExist)
    }

    pub async fn get_version_by_name_and_version(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
        version: &str,
    ) -> PackageResult<package_version::Model> {
        self.version_by_name_and_version(owner_id, package_type, name, version, false)
            .await
    }

    /// Like [`Self::get_version_by_name_and_version`], for versions the
    /// registry keeps for its own bookkeeping.
    pub async fn get_internal_version_by_name_and_version(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
        version: &str,
    ) -> PackageResult<package_version::Model> {
        self.version_by_name_and_version(owner_id, package_type, name, version, true)
            .await
    }

    async fn version_by_name_and_version(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
        version: &str,
        is_internal: bool,
    ) -> PackageResult<package_version::Model> {
        let packages = SeaQuery::select()
            .column(package::Column::Id)
            .from(package::Entity)
            .and_where(package::Column::OwnerId.eq(owner_id))
            .and_where(package::Column::PackageType.eq(package_type))
            .and_where(package::Column::LowerName.eq(name.to_lowercase()))
            .to_owned();

        package_version::Entity::find()
            .filter(package_version::Column::PackageId.in_subquery(packages))
            .filter(package_version::Column::LowerVersion.eq(version.to_lowercase()))
            .filter(package_version::Column::IsInternal.eq(is_internal))
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageVersionNotExist)
    }

    /// All regular versions of an owner's packages of one type.
    pub async fn get_versions_by_package_type(
        &self,
        owner_id: i32,
        package_type: PackageType,
    ) -> PackageResult<Vec<package_version::Model>> {
        let (versions, _) = self
            .search_versions(&VersionSearchOptions {
                owner_id: Some(owner_id),
                package_type: Some(package_type),
                is_internal: Some(false),
                ..Default::default()
            })
            .await?;
        Ok(versions)
    }

    /// All regular versions of one package, newest first.
    pub async fn get_versions_by_package_name(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
    ) -> PackageResult<Vec<package_version::Model>> {
        let (versions, _) = self
            .search_versions(&VersionSearchOptions {
                owner_id: Some(owner_id),
                package_type: Some(package_type),
                name: super::TextMatch::exact(name),
                is_internal: Some(false),
                ..Default::default()
            })
            .await?;
        Ok(versions)
    }

    /// Delete a version with its files and their properties.
    ///
    /// Blobs are left for garbage collection, even when no other file uses them.
    pub async fn delete_version_by_id(&self, id: i32) -> PackageResult<()> {
        let txn = self.conn.begin().await?;
        let properties = PropertyStore::new(&txn);

        let file_ids: Vec<i32> = package_file::Entity::find()
            .select_only()
            .column(package_file::Column::Id)
            .filter(package_file::Column::VersionId.eq(id))
            .into_tuple()
            .all(&txn)
            .await?;
        properties
            .delete_all_for(PropertyType::File, &file_ids)
            .await?;
        package_file::Entity::delete_many()
            .filter(package_file::Column::VersionId.eq(id))
            .exec(&txn)
            .await?;

        properties.delete_all(PropertyType::Version, id).await?;
        let res = package_version::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageVersionNotExist);
        }

        txn.commit().await?;
        Ok(())
    }

    /// Whether any file still belongs to the version.
    pub async fn has_version_file_references(&self, version_id: i32) -> PackageResult<bool> {
        let count = package_file::Entity::find()
            .filter(package_file::Column::VersionId.eq(version_id))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Versions matching `opts`, and the total number of matches.
    pub async fn search_versions(
        &self,
        opts: &VersionSearchOptions,
    ) -> PackageResult<(Vec<package_version::Model>, u64)> {
        self.paginated_versions(package_version::Entity::find().filter(opts.condition()), opts)
            .await
    }

    pub async fn count_versions(&self, opts: &VersionSearchOptions) -> PackageResult<u64> {
        Ok(package_version::Entity::find()
            .filter(opts.condition())
            .count(self.conn)
            .await?)
    }

    /// Like [`Self::search_versions`], keeping only the greatest version of
    /// each package by lowercased version string.
    pub async fn search_latest_versions(
        &self,
        opts: &VersionSearchOptions,
    ) -> PackageResult<(Vec<package_version::Model>, u64)> {
        let select = package_version::Entity::find()
            .filter(opts.condition())
            .filter(Expr::cust(NO_NEWER_SIBLING));
        self.paginated_versions(select, opts).await
    }

    /// The newest regular version of a package.
    ///
    /// Semver-compatible packages compare parsed semantic versions, skipping
    /// strings that do not parse. Everything else falls back to comparing the
    /// lowercased version strings.
    pub async fn latest_version(
        &self,
        package: &package::Model,
    ) -> PackageResult<package_version::Model> {
        if package.semver_compatible {
            let versions = package_version::Entity::find()
                .filter(package_version::Column::PackageId.eq(package.id))
                .filter(package_version::Column::IsInternal.eq(false))
                .all(self.conn)
                .await?;

            let newest = versions
                .into_iter()
                .filter_map(|v| parse_semver(&v.version).map(|sv| (sv, v)))
                .max_by(|(a, _), (b, _)| a.cmp(b));
            if let Some((_, version)) = newest {
                return Ok(version);
            }
        }

        let (mut latest, _) = self
            .search_latest_versions(&VersionSearchOptions {
                package_id: Some(package.id),
                is_internal: Some(false),
                ..Default::default()
            })
            .await?;
        latest.pop().ok_or(PackageError::PackageVersionNotExist)
    }

    async fn paginated_versions(
        &self,
        select: Select<package_version::Entity>,
        opts: &VersionSearchOptions,
    ) -> PackageResult<(Vec<package_version::Model>, u64)> {
        let total = select.clone().count(self.conn).await?;

        let mut select = opts.sort.apply(select);
        if let Some(p) = opts.paginator {
            select = select.offset(p.offset()).limit(p.per_page());
        }

        Ok((select.all(self.conn).await?, total))
    }
}
