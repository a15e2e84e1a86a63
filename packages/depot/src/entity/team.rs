use common::AccessMode;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "team")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub org_id: i32,
    #[sea_orm(belongs_to, from = "org_id", to = "id")]
    pub org: HasOne<super::user::Entity>,

    pub name: String,

    /// Access the team's members get on the organization's packages.
    pub package_access: AccessMode,

    #[sea_orm(has_many)]
    pub members: HasMany<super::team_user::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
