use common::PropertyType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Free-form name/value pair attached to a package, version or file.
///
/// Several rows may share `(ref_type, ref_id, name)`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_property")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub ref_type: PropertyType,
    #[sea_orm(indexed)]
    pub ref_id: i32,

    #[sea_orm(indexed)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub value: String,
}

impl ActiveModelBehavior for ActiveModel {}
