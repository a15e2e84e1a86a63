use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use common::PackageType;
use dashmap::DashMap;
use regex::Regex;
use sea_orm::*;

use crate::entity::package_cleanup_rule;
use crate::error::{PackageError, PackageResult};
use crate::insert::{Inserted, get_or_insert};

/// Rules fetched per query by [`RetentionEngine::iterate_enabled_rules`].
const RULE_BATCH_SIZE: u64 = 100;

/// Fields of a cleanup rule to be created.
#[derive(Debug, Clone)]
pub struct NewCleanupRule {
    pub owner_id: i32,
    pub package_type: PackageType,
    pub enabled: bool,
    pub keep_count: i32,
    pub keep_pattern: String,
    pub remove_days: i32,
    pub remove_pattern: String,
    pub match_full_name: bool,
}

/// Upper bound for a rule's `remove_days`, roughly a thousand years.
pub const MAX_REMOVE_DAYS: i32 = 365_000;

/// Reject counts and ages a rule cannot meaningfully hold.
fn check_rule_limits(keep_count: i32, remove_days: i32) -> PackageResult<()> {
    if keep_count < 0 {
        return Err(PackageError::InvalidArgument(format!(
            "keep_count must not be negative, got {keep_count}"
        )));
    }
    if !(0..=MAX_REMOVE_DAYS).contains(&remove_days) {
        return Err(PackageError::InvalidArgument(format!(
            "remove_days must be between 0 and {MAX_REMOVE_DAYS}, got {remove_days}"
        )));
    }
    Ok(())
}

/// Compile a cleanup pattern. It must match the whole name, ignoring case.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i)\\A{}\\z", pattern))
}

/// Compiled patterns of one rule. `None` means the rule has no such pattern.
#[derive(Debug, Clone, Default)]
pub struct CompiledRule {
    pub keep: Option<Arc<Regex>>,
    pub remove: Option<Arc<Regex>>,
}

impl CompiledRule {
    /// Whether the keep pattern protects `name`.
    pub fn keeps(&self, name: &str) -> bool {
        self.keep.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// Whether the remove pattern selects `name`. Always true without one.
    pub fn removes(&self, name: &str) -> bool {
        self.remove.as_ref().is_none_or(|re| re.is_match(name))
    }
}

/// Compiled rule patterns, kept apart from the rule rows.
///
/// Entries are keyed by rule id and pattern text, so editing a pattern
/// compiles it afresh.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<(i32, String), Arc<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both patterns of `rule`, compiling those not seen before.
    ///
    /// Patterns the rule no longer uses are evicted when a new one is compiled.
    pub fn compiled(&self, rule: &package_cleanup_rule::Model) -> PackageResult<CompiledRule> {
        self.compile_for(rule.id, &rule.keep_pattern, &rule.remove_pattern)
    }

    pub fn compile_for(
        &self,
        rule_id: i32,
        keep_pattern: &str,
        remove_pattern: &str,
    ) -> PackageResult<CompiledRule> {
        // Both must compile before either is cached.
        let keep = self.resolve(rule_id, keep_pattern)?;
        let remove = self.resolve(rule_id, remove_pattern)?;

        let fresh = matches!(keep, Some((_, true))) || matches!(remove, Some((_, true)));
        let keep = keep.map(|(re, _)| self.store(rule_id, keep_pattern, re));
        let remove = remove.map(|(re, _)| self.store(rule_id, remove_pattern, re));

        if fresh {
            self.compiled.retain(|(id, p), _| {
                *id != rule_id || p.as_str() == keep_pattern || p.as_str() == remove_pattern
            });
        }
        Ok(CompiledRule { keep, remove })
    }

    /// One compiled pattern. Empty patterns give `None`; malformed ones an
    /// error, with nothing cached.
    pub fn pattern(&self, rule_id: i32, pattern: &str) -> PackageResult<Option<Arc<Regex>>> {
        Ok(self
            .resolve(rule_id, pattern)?
            .map(|(re, _)| self.store(rule_id, pattern, re)))
    }

    /// The cached regex for `pattern`, or a freshly compiled one flagged `true`.
    fn resolve(&self, rule_id: i32, pattern: &str) -> PackageResult<Option<(Arc<Regex>, bool)>> {
        if pattern.is_empty() {
            return Ok(None);
        }
        if let Some(re) = self.compiled.get(&(rule_id, pattern.to_string())) {
            return Ok(Some((re.clone(), false)));
        }
        Ok(Some((Arc::new(compile_pattern(pattern)?), true)))
    }

    fn store(&self, rule_id: i32, pattern: &str, re: Arc<Regex>) -> Arc<Regex> {
        self.compiled
            .entry((rule_id, pattern.to_string()))
            .or_insert(re)
            .clone()
    }

    /// Drop every pattern compiled for a rule.
    pub fn forget_rule(&self, rule_id: i32) {
        self.compiled.retain(|(id, _), _| *id != rule_id);
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Cleanup rule storage and iteration.
pub struct RetentionEngine<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> RetentionEngine<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Store a rule, or fail with [`PackageError::DuplicateCleanupRule`]
    /// carrying the owner's existing rule for the package type.
    pub async fn insert_rule(
        &self,
        new: &NewCleanupRule,
    ) -> PackageResult<package_cleanup_rule::Model> {
        check_rule_limits(new.keep_count, new.remove_days)?;
        compile_pattern(&new.keep_pattern)?;
        compile_pattern(&new.remove_pattern)?;

        let by_key = package_cleanup_rule::Entity::find()
            .filter(package_cleanup_rule::Column::OwnerId.eq(new.owner_id))
            .filter(package_cleanup_rule::Column::PackageType.eq(new.package_type));

        let now = Utc::now();
        let model = package_cleanup_rule::ActiveModel {
            owner_id: Set(new.owner_id),
            package_type: Set(new.package_type),
            enabled: Set(new.enabled),
            keep_count: Set(new.keep_count),
            keep_pattern: Set(new.keep_pattern.clone()),
            remove_days: Set(new.remove_days),
            remove_pattern: Set(new.remove_pattern.clone()),
            match_full_name: Set(new.match_full_name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match get_or_insert(self.conn, by_key, model).await? {
            Inserted::Created(rule) => Ok(rule),
            Inserted::Existing(rule) => Err(PackageError::DuplicateCleanupRule(Box::new(rule))),
        }
    }

    pub async fn get_rule_by_id(&self, id: i32) -> PackageResult<package_cleanup_rule::Model> {
        package_cleanup_rule::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or(PackageError::CleanupRuleNotExist)
    }

    /// Persist the settings of a rule. Owner and package type stay as stored.
    pub async fn update_rule(
        &self,
        rule: &package_cleanup_rule::Model,
    ) -> PackageResult<package_cleanup_rule::Model> {
        check_rule_limits(rule.keep_count, rule.remove_days)?;
        compile_pattern(&rule.keep_pattern)?;
        compile_pattern(&rule.remove_pattern)?;

        let active = package_cleanup_rule::ActiveModel {
            id: Set(rule.id),
            enabled: Set(rule.enabled),
            keep_count: Set(rule.keep_count),
            keep_pattern: Set(rule.keep_pattern.clone()),
            remove_days: Set(rule.remove_days),
            remove_pattern: Set(rule.remove_pattern.clone()),
            match_full_name: Set(rule.match_full_name),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        match active.update(self.conn).await {
            Ok(updated) => Ok(updated),
            Err(DbErr::RecordNotUpdated) => Err(PackageError::CleanupRuleNotExist),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_rules_by_owner(
        &self,
        owner_id: i32,
    ) -> PackageResult<Vec<package_cleanup_rule::Model>> {
        Ok(package_cleanup_rule::Entity::find()
            .filter(package_cleanup_rule::Column::OwnerId.eq(owner_id))
            .order_by_asc(package_cleanup_rule::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn delete_rule_by_id(&self, id: i32) -> PackageResult<()> {
        let res = package_cleanup_rule::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;
        if res.rows_affected == 0 {
            return Err(PackageError::CleanupRuleNotExist);
        }
        Ok(())
    }

    pub async fn has_owner_rule_for_type(
        &self,
        owner_id: i32,
        package_type: PackageType,
    ) -> PackageResult<bool> {
        let count = package_cleanup_rule::Entity::find()
            .filter(package_cleanup_rule::Column::OwnerId.eq(owner_id))
            .filter(package_cleanup_rule::Column::PackageType.eq(package_type))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Call `f` for every enabled rule in id order.
    ///
    /// Rules are read in batches after the last id seen, so no query stays
    /// open while `f` runs. The first error from `f` stops the iteration.
    pub async fn iterate_enabled_rules<F, Fut>(&self, mut f: F) -> PackageResult<()>
    where
        F: FnMut(package_cleanup_rule::Model) -> Fut,
        Fut: Future<Output = PackageResult<()>>,
    {
        let mut last_id = 0;
        loop {
            let batch = package_cleanup_rule::Entity::find()
                .filter(package_cleanup_rule::Column::Enabled.eq(true))
                .filter(package_cleanup_rule::Column::Id.gt(last_id))
                .order_by_asc(package_cleanup_rule::Column::Id)
                .limit(RULE_BATCH_SIZE)
                .all(self.conn)
                .await?;

            let done = (batch.len() as u64) < RULE_BATCH_SIZE;
            for rule in batch {
                last_id = rule.id;
                f(rule).await?;
            }
            if done {
                return Ok(());
            }
        }
    }
}
