//! Packages and their versions.

mod package;
mod search;
mod version;

pub use package::NewPackage;
pub use search::{
    FileSearchOptions, PackageSearchOptions, Paginator, TextMatch, VersionSearchOptions,
    VersionSort, escape_like,
};
pub use version::{NewVersion, parse_semver};

use sea_orm::{ConnectionTrait, TransactionTrait};

pub struct PackageCatalog<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> PackageCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}
