use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "package_file_version_name_key")]
    pub version_id: i32,
    #[sea_orm(belongs_to, from = "version_id", to = "id")]
    pub version: HasOne<super::package_version::Entity>,

    #[sea_orm(indexed)]
    pub blob_id: i32,
    #[sea_orm(belongs_to, from = "blob_id", to = "id")]
    pub blob: HasOne<super::package_blob::Entity>,

    pub name: String,
    #[sea_orm(unique_key = "package_file_version_name_key")]
    pub lower_name: String,

    /// Tells apart files sharing a name within one version (e.g. a debug-symbol GUID).
    #[sea_orm(unique_key = "package_file_version_name_key")]
    pub composite_key: String,

    /// Primary artifact of the version. At most one per version.
    #[sea_orm(default_value = false)]
    pub is_lead: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
