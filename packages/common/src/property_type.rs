#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of row a package property is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "package"))]
    Package,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "version"))]
    Version,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "file"))]
    File,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Version => "version",
            Self::File => "file",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
