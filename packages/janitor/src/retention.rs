use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use depot::catalog::{PackageCatalog, VersionSearchOptions, VersionSort};
use depot::cleanup::{CompiledRule, PatternCache, RetentionEngine};
use depot::entity::{package, package_cleanup_rule};
use depot::{PackageResult, PackageService};
use tracing::{error, info, warn};

/// How one cleanup rule splits the versions of a package.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    patterns: CompiledRule,
    keep_count: usize,
    remove_days: i64,
    match_full_name: bool,
}

impl RetentionPolicy {
    pub fn new(
        patterns: CompiledRule,
        keep_count: i32,
        remove_days: i32,
        match_full_name: bool,
    ) -> Self {
        Self {
            patterns,
            keep_count: keep_count.max(0) as usize,
            remove_days: remove_days.max(0) as i64,
            match_full_name,
        }
    }

    pub fn from_rule(
        rule: &package_cleanup_rule::Model,
        cache: &PatternCache,
    ) -> PackageResult<Self> {
        Ok(Self::new(
            cache.compiled(rule)?,
            rule.keep_count,
            rule.remove_days,
            rule.match_full_name,
        ))
    }

    /// Indices of the versions to remove. `versions` holds `(version, created_at)`
    /// pairs, newest first.
    ///
    /// The newest `keep_count` versions and those matching the keep pattern
    /// stay. The rest go when they are older than `remove_days` (if set) and
    /// match the remove pattern (if set). Patterns see `package/version` when
    /// matching full names, otherwise the bare version.
    pub fn select_removals(
        &self,
        package_name: &str,
        versions: &[(&str, DateTime<Utc>)],
        now: DateTime<Utc>,
    ) -> Vec<usize> {
        // Out-of-range ages leave no version old enough.
        let cutoff = chrono::Duration::try_days(self.remove_days)
            .and_then(|age| now.checked_sub_signed(age));

        versions
            .iter()
            .enumerate()
            .skip(self.keep_count)
            .filter(|(_, (version, created_at))| {
                let subject = if self.match_full_name {
                    format!("{}/{}", package_name.to_lowercase(), version.to_lowercase())
                } else {
                    version.to_lowercase()
                };
                !self.patterns.keeps(&subject)
                    && (self.remove_days == 0 || cutoff.is_some_and(|c| *created_at < c))
                    && self.patterns.removes(&subject)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Apply every enabled rule. Returns the number of versions removed.
pub async fn apply_cleanup_rules(
    service: &PackageService,
    cache: &PatternCache,
) -> anyhow::Result<u64> {
    let db = service.db();
    let removed = AtomicU64::new(0);

    RetentionEngine::new(db)
        .iterate_enabled_rules(|rule| {
            let removed = &removed;
            async move {
                match apply_rule(service, cache, &rule).await {
                    Ok(n) => {
                        removed.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => error!(
                        rule_id = rule.id,
                        owner_id = rule.owner_id,
                        error = %e,
                        "Failed to apply cleanup rule"
                    ),
                }
                Ok(())
            }
        })
        .await?;

    let catalog = PackageCatalog::new(db);
    for package in catalog.find_unreferenced_packages().await? {
        if let Err(e) = catalog.delete_package_by_id(package.id).await {
            error!(
                package_id = package.id,
                error = %e,
                "Failed to delete package without versions"
            );
        }
    }

    Ok(removed.into_inner())
}

async fn apply_rule(
    service: &PackageService,
    cache: &PatternCache,
    rule: &package_cleanup_rule::Model,
) -> PackageResult<u64> {
    let policy = match RetentionPolicy::from_rule(rule, cache) {
        Ok(policy) => policy,
        Err(e) => {
            warn!(rule_id = rule.id, error = %e, "Skipping cleanup rule with invalid pattern");
            return Ok(0);
        }
    };

    let catalog = PackageCatalog::new(service.db());
    let packages = catalog
        .get_packages_by_type(rule.owner_id, rule.package_type)
        .await?;

    let mut removed = 0;
    for package in packages {
        removed += apply_to_package(service, &policy, &package).await?;
    }
    if removed > 0 {
        info!(rule_id = rule.id, removed, "Applied cleanup rule");
    }
    Ok(removed)
}

async fn apply_to_package(
    service: &PackageService,
    policy: &RetentionPolicy,
    package: &package::Model,
) -> PackageResult<u64> {
    let (versions, _) = PackageCatalog::new(service.db())
        .search_versions(&VersionSearchOptions {
            package_id: Some(package.id),
            is_internal: Some(false),
            sort: VersionSort::CreatedDesc,
            ..Default::default()
        })
        .await?;

    let entries: Vec<(&str, DateTime<Utc>)> = versions
        .iter()
        .map(|v| (v.version.as_str(), v.created_at))
        .collect();

    let mut removed = 0;
    for i in policy.select_removals(&package.name, &entries, Utc::now()) {
        let version = &versions[i];
        match service.delete_package_version_and_references(version).await {
            Ok(()) => removed += 1,
            Err(e) => error!(
                package_id = package.id,
                version_id = version.id,
                error = %e,
                "Failed to delete package version"
            ),
        }
    }
    Ok(removed)
}
