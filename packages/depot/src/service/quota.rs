use common::PackageType;
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::error;

use super::{Doer, PackageService};
use crate::catalog::{FileSearchOptions, PackageCatalog, VersionSearchOptions};
use crate::error::{PackageError, PackageResult, QuotaKind};
use crate::file::FileIndex;

impl PackageService {
    /// Fail if the owner has more regular versions than allowed. Admins are not limited.
    pub async fn check_count_quota<C>(
        &self,
        conn: &C,
        doer: &Doer,
        owner_id: i32,
    ) -> PackageResult<()>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let limit = self.limits.total_owner_count;
        if doer.is_admin || limit < 0 {
            return Ok(());
        }

        let total = PackageCatalog::new(conn)
            .count_versions(&VersionSearchOptions {
                owner_id: Some(owner_id),
                is_internal: Some(false),
                ..Default::default()
            })
            .await
            .inspect_err(|e| error!(owner_id, error = %e, "Failed to count package versions"))?;

        if total as i64 > limit {
            return Err(PackageError::QuotaExceeded(QuotaKind::TotalCount));
        }
        Ok(())
    }

    /// Fail if an upload of `upload_size` bytes is larger than its type allows
    /// or would push the owner over the total size limit. Admins are not limited.
    pub async fn check_size_quota<C>(
        &self,
        conn: &C,
        doer: &Doer,
        owner_id: i32,
        package_type: PackageType,
        upload_size: i64,
    ) -> PackageResult<()>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if doer.is_admin {
            return Ok(());
        }

        let type_limit = self.limits.size_limit_for(package_type);
        if type_limit > -1 && type_limit < upload_size {
            return Err(PackageError::QuotaExceeded(QuotaKind::TypeSize(package_type)));
        }

        let total_limit = self.limits.total_owner_size;
        if total_limit > -1 {
            let total = FileIndex::new(conn)
                .calculate_file_size(&FileSearchOptions {
                    owner_id: Some(owner_id),
                    ..Default::default()
                })
                .await
                .inspect_err(|e| error!(owner_id, error = %e, "Failed to calculate file size"))?;
            if total + upload_size > total_limit {
                return Err(PackageError::QuotaExceeded(QuotaKind::TotalSize));
            }
        }

        Ok(())
    }
}
