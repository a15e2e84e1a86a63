use common::{PackageType, PropertyType};
use sea_orm::sea_query::{LikeExpr, Query as SeaQuery, SelectStatement};
use sea_orm::*;

use crate::entity::{package, package_blob, package_file, package_property, package_version};

/// One page of a result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page: u64,
    per_page: u64,
}

impl Paginator {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: Ord::max(page, 1),
            per_page: Ord::max(per_page, 1),
        }
    }

    /// 1-based.
    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub(crate) fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// Case-insensitive match on a name or version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TextMatch {
    #[default]
    Any,
    Exact(String),
    Contains(String),
}

impl TextMatch {
    pub fn exact(s: impl Into<String>) -> Self {
        Self::Exact(s.into())
    }

    pub fn contains(s: impl Into<String>) -> Self {
        Self::Contains(s.into())
    }

    fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Condition on a column that already holds lowercased text.
    pub(crate) fn condition(&self, lower_col: impl ColumnTrait) -> Condition {
        match self {
            Self::Any => Condition::all(),
            Self::Exact(s) => Condition::all().add(lower_col.eq(s.to_lowercase())),
            Self::Contains(s) => {
                let term = escape_like(&s.to_lowercase());
                Condition::all()
                    .add(lower_col.like(LikeExpr::new(format!("%{}%", term)).escape('\\')))
            }
        }
    }
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    /// By lowercased version string.
    VersionAsc,
    VersionDesc,
}

impl VersionSort {
    pub(crate) fn apply(
        self,
        select: Select<package_version::Entity>,
    ) -> Select<package_version::Entity> {
        use package_version::Column;
        match self {
            Self::CreatedDesc => select
                .order_by_desc(Column::CreatedAt)
                .order_by_desc(Column::Id),
            Self::CreatedAsc => select.order_by_asc(Column::CreatedAt).order_by_asc(Column::Id),
            Self::VersionAsc => select
                .order_by_asc(Column::LowerVersion)
                .order_by_asc(Column::Id),
            Self::VersionDesc => select
                .order_by_desc(Column::LowerVersion)
                .order_by_desc(Column::Id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackageSearchOptions {
    pub owner_id: Option<i32>,
    pub package_type: Option<PackageType>,
    pub name: TextMatch,
    pub include_internal: bool,
    pub paginator: Option<Paginator>,
}

impl PackageSearchOptions {
    pub(crate) fn condition(&self) -> Condition {
        let mut cond = package_condition(self.owner_id, self.package_type, &self.name);
        if !self.include_internal {
            cond = cond.add(package::Column::IsInternal.eq(false));
        }
        cond
    }
}

#[derive(Debug, Clone, Default)]
pub struct VersionSearchOptions {
    pub owner_id: Option<i32>,
    pub package_type: Option<PackageType>,
    pub package_id: Option<i32>,
    /// Package name.
    pub name: TextMatch,
    pub version: TextMatch,
    /// Version properties that must all be present.
    pub properties: Vec<(String, String)>,
    /// `None` matches internal and regular versions alike.
    pub is_internal: Option<bool>,
    /// Only versions with a file of this name.
    pub has_file_with_name: Option<String>,
    /// Only versions with (or without) any file.
    pub has_files: Option<bool>,
    pub sort: VersionSort,
    pub paginator: Option<Paginator>,
}

impl VersionSearchOptions {
    pub(crate) fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if self.owner_id.is_some() || self.package_type.is_some() || !self.name.is_any() {
            let packages = package_condition(self.owner_id, self.package_type, &self.name);
            cond = cond.add(package_version::Column::PackageId.in_subquery(package_ids(packages)));
        }
        if let Some(package_id) = self.package_id {
            cond = cond.add(package_version::Column::PackageId.eq(package_id));
        }
        cond = cond.add(self.version.condition(package_version::Column::LowerVersion));
        if let Some(is_internal) = self.is_internal {
            cond = cond.add(package_version::Column::IsInternal.eq(is_internal));
        }

        for (name, value) in &self.properties {
            cond = cond.add(
                package_version::Column::Id.in_subquery(
                    SeaQuery::select()
                        .column(package_property::Column::RefId)
                        .from(package_property::Entity)
                        .and_where(package_property::Column::RefType.eq(PropertyType::Version))
                        .and_where(package_property::Column::Name.eq(name.as_str()))
                        .and_where(package_property::Column::Value.eq(value.as_str()))
                        .to_owned(),
                ),
            );
        }

        if let Some(ref file_name) = self.has_file_with_name {
            cond = cond.add(
                package_version::Column::Id.in_subquery(
                    SeaQuery::select()
                        .column(package_file::Column::VersionId)
                        .from(package_file::Entity)
                        .and_where(package_file::Column::LowerName.eq(file_name.to_lowercase()))
                        .to_owned(),
                ),
            );
        }
        match self.has_files {
            Some(true) => {
                cond = cond.add(package_version::Column::Id.in_subquery(file_version_ids()))
            }
            Some(false) => {
                cond = cond.add(package_version::Column::Id.not_in_subquery(file_version_ids()))
            }
            None => {}
        }

        cond
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileSearchOptions {
    pub owner_id: Option<i32>,
    pub package_type: Option<PackageType>,
    pub version_id: Option<i32>,
    /// File name, matched case-insensitively.
    pub name: TextMatch,
    pub composite_key: Option<String>,
    /// File properties that must all be present.
    pub properties: Vec<(String, String)>,
    /// Hex SHA-256 of the file content.
    pub sha256: Option<String>,
    /// Only files created before `now - older_than`.
    pub older_than: Option<chrono::Duration>,
    pub paginator: Option<Paginator>,
}

impl FileSearchOptions {
    pub(crate) fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if self.owner_id.is_some() || self.package_type.is_some() {
            let packages = package_condition(self.owner_id, self.package_type, &TextMatch::Any);
            let versions = SeaQuery::select()
                .column(package_version::Column::Id)
                .from(package_version::Entity)
                .and_where(package_version::Column::PackageId.in_subquery(package_ids(packages)))
                .to_owned();
            cond = cond.add(package_file::Column::VersionId.in_subquery(versions));
        }
        if let Some(version_id) = self.version_id {
            cond = cond.add(package_file::Column::VersionId.eq(version_id));
        }
        cond = cond.add(self.name.condition(package_file::Column::LowerName));
        if let Some(ref key) = self.composite_key {
            cond = cond.add(package_file::Column::CompositeKey.eq(key.as_str()));
        }
        for (name, value) in &self.properties {
            cond = cond.add(
                package_file::Column::Id.in_subquery(
                    SeaQuery::select()
                        .column(package_property::Column::RefId)
                        .from(package_property::Entity)
                        .and_where(package_property::Column::RefType.eq(PropertyType::File))
                        .and_where(package_property::Column::Name.eq(name.as_str()))
                        .and_where(package_property::Column::Value.eq(value.as_str()))
                        .to_owned(),
                ),
            );
        }
        if let Some(ref sha256) = self.sha256 {
            cond = cond.add(
                package_file::Column::BlobId.in_subquery(
                    SeaQuery::select()
                        .column(package_blob::Column::Id)
                        .from(package_blob::Entity)
                        .and_where(
                            package_blob::Column::HashSha256
                                .eq(sha256.to_lowercase()),
                        )
                        .to_owned(),
                ),
            );
        }
        if let Some(older_than) = self.older_than {
            cond = cond.add(package_file::Column::CreatedAt.lt(chrono::Utc::now() - older_than));
        }

        cond
    }
}

fn package_condition(
    owner_id: Option<i32>,
    package_type: Option<PackageType>,
    name: &TextMatch,
) -> Condition {
    let mut cond = Condition::all();
    if let Some(owner_id) = owner_id {
        cond = cond.add(package::Column::OwnerId.eq(owner_id));
    }
    if let Some(package_type) = package_type {
        cond = cond.add(package::Column::PackageType.eq(package_type));
    }
    cond.add(name.condition(package::Column::LowerName))
}

fn package_ids(cond: Condition) -> SelectStatement {
    SeaQuery::select()
        .column(package::Column::Id)
        .from(package::Entity)
        .cond_where(cond)
        .to_owned()
}

fn file_version_ids() -> SelectStatement {
    SeaQuery::select()
        .column(package_file::Column::VersionId)
        .from(package_file::Entity)
        .to_owned()
}
