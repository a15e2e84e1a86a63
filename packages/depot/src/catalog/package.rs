use common::{PackageType, PropertyType};
use sea_orm::prelude::Expr;
use sea_orm::*;

use super::PackageCatalog;
use super::search::PackageSearchOptions;
use crate::entity::{package, package_version};
use crate::error::{PackageError, PackageResult};
use crate::insert::{Inserted, get_or_insert};
use crate::property::PropertyStore;

const WITHOUT_VERSIONS: &str = "NOT EXISTS (SELECT 1 FROM package_version \
     WHERE package_version.package_id = package.id)";

/// Fields of a package to be created.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub owner_id: i32,
    pub package_type: PackageType,
    pub name: String,
    pub semver_compatible: bool,
    pub is_internal: bool,
}

impl<'a, C: ConnectionTrait + TransactionTrait> PackageCatalog<'a, C> {
    /// Store a package, or fail with [`PackageError::DuplicatePackage`] carrying
    /// the row that already has this owner, type and name.
    pub async fn try_insert_package(&self, new: &NewPackage) -> PackageResult<package::Model> {
        let lower_name = new.name.to_lowercase();
        let by_key = package::Entity::find()
            .filter(package::Column::OwnerId.eq(new.owner_id))
            .filter(package::Column::PackageType.eq(new.package_type))
            .filter(package::Column::LowerName.eq(lower_name.clone()));

        let model = package::ActiveModel {
            owner_id: Set(new.owner_id),
            repo_id: Set(None),
            package_type: Set(new.package_type),
            name: Set(new.name.clone()),
            lower_name: Set(lower_name),
            semver_compatible: Set(new.semver_compatible),
            is_internal: Set(new.is_internal),
            ..Default::default()
        };

        match get_or_insert(self.conn, by_key, model).await? {
            Inserted::Created(p) => Ok(p),
            Inserted::Existing(p) => Err(PackageError::DuplicatePackage(Box::new(p))),
        }
    }

    pub async fn get_package_by_id(&self, id: i32) -> PackageResult<package::Model> {
        package::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageNotExist)
    }

    /// Look up a regular (non-internal) package by name, ignoring case.
    pub async fn get_package_by_name(
        &self,
        owner_id: i32,
        package_type: PackageType,
        name: &str,
    ) -> PackageResult<package::Model> {
        package::Entity::find()
            .filter(package::Column::OwnerId.eq(owner_id))
            .filter(package::Column::PackageType.eq(package_type))
            .filter(package::Column::LowerName.eq(name.to_lowercase()))
            .filter(package::Column::IsInternal.eq(false))
            .one(self.conn)
            .await?
            .ok_or(PackageError::PackageNotExist)
    }

    pub async fn get_packages_by_type(
        &self,
        owner_id: i32,
        package_type: PackageType,
    ) -> PackageResult<Vec<package::Model>> {
        Ok(package::Entity::find()
            .filter(package::Column::OwnerId.eq(owner_id))
            .filter(package::Column::PackageType.eq(package_type))
            .filter(package::Column::IsInternal.eq(false))
            .order_by_asc(package::Column::LowerName)
            .all(self.conn)
            .await?)
    }

    /// Packages matching `opts` ordered by name, and the total number of matches.
    pub async fn search_packages(
        &self,
        opts: &PackageSearchOptions,
    ) -> PackageResult<(Vec<package::Model>, u64)> {
        let select = package::Entity::find().filter(opts.condition());
        let total = select.clone().count(self.conn).await?;

        let mut select = select
            .order_by_asc(package::Column::LowerName)
            .order_by_asc(package::Column::Id);
        if let Some(p) = opts.paginator {
            select = select.offset(p.offset()).limit(p.per_page());
        }

        Ok((select.all(self.conn).await?, total))
    }

    pub async fn has_owner_packages(&self, owner_id: i32) -> PackageResult<bool> {
        let count = package::Entity::find()
            .filter(package::Column::OwnerId.eq(owner_id))
            .filter(package::Column::IsInternal.eq(false))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Packages left without any version.
    pub async fn find_unreferenced_packages(&self) -> PackageResult<Vec<package::Model>> {
        Ok(package::Entity::find()
            .filter(Expr::cust(WITHOUT_VERSIONS))
            .order_by_asc(package::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn set_repository_link(&self, package_id: i32, repo_id: i32) -> PackageResult<()> {
        let res = package::Entity::update_many()
            .col_expr(package::Column::RepoId, Expr::value(repo_id))
            .filter(package::Column::Id.eq(package_id))
            .exec(self.conn)
            .await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageNotExist);
        }
        Ok(())
    }

    pub async fn unlink_repository_from_all_packages(&self, repo_id: i32) -> PackageResult<u64> {
        let res = package::Entity::update_many()
            .col_expr(package::Column::RepoId, Expr::value(Option::<i32>::None))
            .filter(package::Column::RepoId.eq(repo_id))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// Delete a package with all its versions, files and properties.
    ///
    /// Blobs are left for garbage collection.
    pub async fn delete_package_by_id(&self, id: i32) -> PackageResult<()> {
        let txn = self.conn.begin().await?;

        let version_ids: Vec<i32> = package_version::Entity::find()
            .select_only()
            .column(package_version::Column::Id)
            .filter(package_version::Column::PackageId.eq(id))
            .into_tuple()
            .all(&txn)
            .await?;

        let catalog = PackageCatalog::new(&txn);
        for version_id in version_ids {
            catalog.delete_version_by_id(version_id).await?;
        }
        PropertyStore::new(&txn)
            .delete_all(PropertyType::Package, id)
            .await?;

        let res = package::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(PackageError::PackageNotExist);
        }

        txn.commit().await?;
        Ok(())
    }
}
