#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};

/// Who may see an owner (user or organization) and its packages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone, including anonymous readers.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "public"))]
    Public,
    /// Visible to any signed-in user.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "limited"))]
    Limited,
    /// Visible to the owner and organization members only.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "private"))]
    Private,
}

/// Access level a team grants on its organization's packages.
///
/// Variants are ordered so that `mode >= AccessMode::Read` means "can read".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "none"))]
    None,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "read"))]
    Read,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "write"))]
    Write,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "admin"))]
    Admin,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "owner"))]
    Owner,
}

impl AccessMode {
    pub fn can_read(&self) -> bool {
        *self >= Self::Read
    }
}
