use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_version")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "package_version_package_lower")]
    pub package_id: i32,
    #[sea_orm(belongs_to, from = "package_id", to = "id")]
    pub package: HasOne<super::package::Entity>,

    /// Uploader. Not a foreign key: accounts may be deleted while their uploads stay.
    #[sea_orm(indexed)]
    pub creator_id: i32,

    pub version: String,
    #[sea_orm(unique_key = "package_version_package_lower")]
    pub lower_version: String,

    /// Ecosystem metadata as JSON, opaque to the store.
    #[sea_orm(column_type = "Text")]
    pub metadata_json: String,

    #[sea_orm(default_value = false, indexed)]
    pub is_internal: bool,

    #[sea_orm(default_value = 0)]
    pub download_count: i64,

    #[sea_orm(has_many)]
    pub files: HasMany<super::package_file::Entity>,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
