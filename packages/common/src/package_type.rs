#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ecosystem a package belongs to.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "alpine"))]
    Alpine,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "cargo"))]
    Cargo,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "chef"))]
    Chef,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "composer"))]
    Composer,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "conan"))]
    Conan,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "conda"))]
    Conda,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "container"))]
    Container,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "debian"))]
    Debian,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "generic"))]
    Generic,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "go"))]
    Go,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "helm"))]
    Helm,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "maven"))]
    Maven,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "npm"))]
    Npm,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "nuget"))]
    NuGet,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pub"))]
    Pub,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pypi"))]
    PyPi,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rpm"))]
    Rpm,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rubygems"))]
    RubyGems,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "swift"))]
    Swift,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "vagrant"))]
    Vagrant,
}

impl PackageType {
    /// All supported package types.
    pub const ALL: &'static [PackageType] = &[
        Self::Alpine,
        Self::Cargo,
        Self::Chef,
        Self::Composer,
        Self::Conan,
        Self::Conda,
        Self::Container,
        Self::Debian,
        Self::Generic,
        Self::Go,
        Self::Helm,
        Self::Maven,
        Self::Npm,
        Self::NuGet,
        Self::Pub,
        Self::PyPi,
        Self::Rpm,
        Self::RubyGems,
        Self::Swift,
        Self::Vagrant,
    ];

    /// Returns the lowercase name used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpine => "alpine",
            Self::Cargo => "cargo",
            Self::Chef => "chef",
            Self::Composer => "composer",
            Self::Conan => "conan",
            Self::Conda => "conda",
            Self::Container => "container",
            Self::Debian => "debian",
            Self::Generic => "generic",
            Self::Go => "go",
            Self::Helm => "helm",
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::NuGet => "nuget",
            Self::Pub => "pub",
            Self::PyPi => "pypi",
            Self::Rpm => "rpm",
            Self::RubyGems => "rubygems",
            Self::Swift => "swift",
            Self::Vagrant => "vagrant",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown package type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePackageTypeError {
    invalid: String,
}

impl fmt::Display for ParsePackageTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown package type '{}'", self.invalid)
    }
}

impl std::error::Error for ParsePackageTypeError {}

impl FromStr for PackageType {
    type Err = ParsePackageTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParsePackageTypeError {
                invalid: s.to_string(),
            })
    }
}
