use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repository")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    pub name: String,
    pub lower_name: String,
    #[sea_orm(default_value = false)]
    pub is_private: bool,

    #[sea_orm(has_many)]
    pub packages: HasMany<super::package::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
