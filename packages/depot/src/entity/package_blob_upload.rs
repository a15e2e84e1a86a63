use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An in-flight resumable upload.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_blob_upload")]
pub struct Model {
    /// Random lowercase token; doubles as the capability to resume the upload.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(default_value = 0)]
    pub bytes_received: i64,

    /// Serialized state of the uploader's rolling hash. Opaque to the store.
    pub hash_state: Vec<u8>,

    pub created_at: DateTimeUtc,
    #[sea_orm(indexed)]
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
