use common::PackageType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-owner retention policy for one package type.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_cleanup_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "package_cleanup_rule_owner_type")]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    #[sea_orm(unique_key = "package_cleanup_rule_owner_type")]
    pub package_type: PackageType,

    #[sea_orm(default_value = false, indexed)]
    pub enabled: bool,

    /// Number of most recent versions always kept.
    pub keep_count: i32,
    /// Versions matching this pattern are always kept. Empty disables it.
    pub keep_pattern: String,
    /// Only versions older than this many days are removed. 0 disables the age check.
    pub remove_days: i32,
    /// Only versions matching this pattern are removed. Empty disables it.
    pub remove_pattern: String,
    /// Match patterns against "owner/name" instead of the bare package name.
    pub match_full_name: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
