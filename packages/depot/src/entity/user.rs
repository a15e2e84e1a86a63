use common::Visibility;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A package owner: an individual account or an organization.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    #[sea_orm(unique)]
    pub lower_name: String,

    #[sea_orm(default_value = false)]
    pub is_admin: bool,
    #[sea_orm(default_value = false)]
    pub is_organization: bool,
    pub visibility: Visibility,

    #[sea_orm(has_many)]
    pub packages: HasMany<super::package::Entity>,

    #[sea_orm(has_many)]
    pub repositories: HasMany<super::repository::Entity>,

    /// Teams of this organization. Empty for individual accounts.
    #[sea_orm(has_many)]
    pub teams: HasMany<super::team::Entity>,

    #[sea_orm(has_many)]
    pub team_memberships: HasMany<super::team_user::Entity>,

    #[sea_orm(has_many)]
    pub cleanup_rules: HasMany<super::package_cleanup_rule::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
