use common::PackageType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "package_owner_type_name")]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    /// Repository the package is linked to, if any.
    #[sea_orm(indexed)]
    pub repo_id: Option<i32>,
    #[sea_orm(belongs_to, from = "repo_id", to = "id")]
    pub repository: HasOne<super::repository::Entity>,

    #[sea_orm(unique_key = "package_owner_type_name")]
    pub package_type: PackageType,

    pub name: String,
    #[sea_orm(unique_key = "package_owner_type_name")]
    pub lower_name: String,

    /// Versions of this package order as semantic versions.
    #[sea_orm(default_value = false)]
    pub semver_compatible: bool,

    /// Housekeeping package created by the registry itself, hidden from listings.
    #[sea_orm(default_value = false, indexed)]
    pub is_internal: bool,

    #[sea_orm(has_many)]
    pub versions: HasMany<super::package_version::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
