use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable, deduplicated package content. The bytes live in the content store
/// under `hash_sha256`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_blob")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub size: i64,

    #[sea_orm(unique_key = "package_blob_digests")]
    pub hash_md5: String,
    #[sea_orm(unique_key = "package_blob_digests")]
    pub hash_sha1: String,
    #[sea_orm(unique_key = "package_blob_digests", indexed)]
    pub hash_sha256: String,
    #[sea_orm(unique_key = "package_blob_digests")]
    pub hash_sha512: String,

    #[sea_orm(has_many)]
    pub files: HasMany<super::package_file::Entity>,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
