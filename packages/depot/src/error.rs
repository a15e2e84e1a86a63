use common::PackageType;
use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::{package, package_cleanup_rule, package_file, package_version};

/// Which quota an upload ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    /// Single upload larger than the per-type limit.
    TypeSize(PackageType),
    /// Owner's total stored size would exceed the limit.
    TotalSize,
    /// Owner already has the maximum number of versions.
    TotalCount,
}

/// Errors returned by the package store.
///
/// `Duplicate*` variants carry the row that already holds the natural key so
/// callers can continue with it.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package does not exist")]
    PackageNotExist,

    #[error("package version does not exist")]
    PackageVersionNotExist,

    #[error("package file does not exist")]
    PackageFileNotExist,

    #[error("package blob does not exist")]
    PackageBlobNotExist,

    #[error("blob upload does not exist")]
    BlobUploadNotExist,

    #[error("package cleanup rule does not exist")]
    CleanupRuleNotExist,

    #[error("package already exists")]
    DuplicatePackage(Box<package::Model>),

    #[error("package version already exists")]
    DuplicatePackageVersion(Box<package_version::Model>),

    #[error("package file already exists")]
    DuplicatePackageFile(Box<package_file::Model>),

    #[error("a cleanup rule for this package type already exists")]
    DuplicateCleanupRule(Box<package_cleanup_rule::Model>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid cleanup pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("package quota exceeded: {0:?}")]
    QuotaExceeded(QuotaKind),

    #[error("invalid package metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("content store error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl PackageError {
    pub fn is_not_exist(&self) -> bool {
        matches!(
            self,
            Self::PackageNotExist
                | Self::PackageVersionNotExist
                | Self::PackageFileNotExist
                | Self::PackageBlobNotExist
                | Self::BlobUploadNotExist
                | Self::CleanupRuleNotExist
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePackage(_)
                | Self::DuplicatePackageVersion(_)
                | Self::DuplicatePackageFile(_)
                | Self::DuplicateCleanupRule(_)
        )
    }

    /// Malformed input from the caller, as opposed to missing rows or storage failures.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::InvalidPattern(_)
                | Self::Storage(StorageError::InvalidHash(_))
                | Self::Storage(StorageError::DigestMismatch { .. })
        )
    }
}

pub type PackageResult<T> = Result<T, PackageError>;
