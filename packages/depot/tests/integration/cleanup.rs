use common::PackageType;

use depot::cleanup::{NewCleanupRule, PatternCache, RetentionEngine};
use depot::error::{PackageError, PackageResult};

use crate::common::TestStore;

fn rule(owner_id: i32, package_type: PackageType, enabled: bool) -> NewCleanupRule {
    NewCleanupRule {
        owner_id,
        package_type,
        enabled,
        keep_count: 2,
        keep_pattern: String::new(),
        remove_days: 30,
        remove_pattern: ".*-snapshot".to_string(),
        match_full_name: false,
    }
}

#[tokio::test]
async fn one_rule_per_owner_and_type() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let engine = RetentionEngine::new(&store.db);

    let created = engine
        .insert_rule(&rule(owner.id, PackageType::Maven, true))
        .await
        .unwrap();
    assert!(
        engine
            .has_owner_rule_for_type(owner.id, PackageType::Maven)
            .await
            .unwrap()
    );
    assert!(
        !engine
            .has_owner_rule_for_type(owner.id, PackageType::Npm)
            .await
            .unwrap()
    );

    match engine
        .insert_rule(&rule(owner.id, PackageType::Maven, false))
        .await
    {
        Err(PackageError::DuplicateCleanupRule(existing)) => assert_eq!(existing.id, created.id),
        other => panic!("expected DuplicateCleanupRule, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_patterns_are_rejected() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let engine = RetentionEngine::new(&store.db);

    let mut bad = rule(owner.id, PackageType::Maven, true);
    bad.keep_pattern = "([a-z".to_string();
    assert!(matches!(
        engine.insert_rule(&bad).await,
        Err(PackageError::InvalidPattern(_))
    ));

    let mut stored = engine
        .insert_rule(&rule(owner.id, PackageType::Maven, true))
        .await
        .unwrap();
    stored.remove_pattern = "*".to_string();
    assert!(matches!(
        engine.update_rule(&stored).await,
        Err(PackageError::InvalidPattern(_))
    ));
}

#[tokio::test]
async fn out_of_range_counts_and_ages_are_rejected() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let engine = RetentionEngine::new(&store.db);

    let mut negative = rule(owner.id, PackageType::Maven, true);
    negative.keep_count = -1;
    assert!(matches!(
        engine.insert_rule(&negative).await,
        Err(PackageError::InvalidArgument(_))
    ));

    let mut ancient = rule(owner.id, PackageType::Maven, true);
    ancient.remove_days = 100_000_000;
    assert!(matches!(
        engine.insert_rule(&ancient).await,
        Err(PackageError::InvalidArgument(_))
    ));

    let mut stored = engine
        .insert_rule(&rule(owner.id, PackageType::Maven, true))
        .await
        .unwrap();
    stored.remove_days = -5;
    assert!(matches!(
        engine.update_rule(&stored).await,
        Err(PackageError::InvalidArgument(_))
    ));
    assert_eq!(
        engine.get_rule_by_id(stored.id).await.unwrap().remove_days,
        30
    );
}

#[tokio::test]
async fn rules_can_be_updated_and_deleted() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let engine = RetentionEngine::new(&store.db);
    let cache = PatternCache::new();

    let mut stored = engine
        .insert_rule(&rule(owner.id, PackageType::Npm, true))
        .await
        .unwrap();
    let compiled = cache.compiled(&stored).unwrap();
    assert!(compiled.removes("1.0.0-SNAPSHOT"));
    assert!(!compiled.removes("1.0.0"));

    stored.keep_count = 5;
    stored.remove_pattern = "1\\..*".to_string();
    let updated = engine.update_rule(&stored).await.unwrap();
    assert_eq!(updated.keep_count, 5);
    assert_eq!(updated.package_type, PackageType::Npm);

    let recompiled = cache.compiled(&updated).unwrap();
    assert!(recompiled.removes("1.0.0"));
    assert_eq!(cache.len(), 1);

    assert_eq!(engine.get_rules_by_owner(owner.id).await.unwrap().len(), 1);
    engine.delete_rule_by_id(stored.id).await.unwrap();
    assert!(matches!(
        engine.get_rule_by_id(stored.id).await,
        Err(PackageError::CleanupRuleNotExist)
    ));
    assert!(matches!(
        engine.delete_rule_by_id(stored.id).await,
        Err(PackageError::CleanupRuleNotExist)
    ));
}

#[tokio::test]
async fn iteration_visits_enabled_rules_in_id_order() {
    let store = TestStore::new().await;
    let engine = RetentionEngine::new(&store.db);

    let mut expected = Vec::new();
    for i in 0..120 {
        let owner = store.create_user(&format!("user{i}")).await;
        let enabled = i % 3 != 0;
        let created = engine
            .insert_rule(&rule(owner.id, PackageType::Generic, enabled))
            .await
            .unwrap();
        if enabled {
            expected.push(created.id);
        }
    }

    let mut visited = Vec::new();
    engine
        .iterate_enabled_rules(|rule| {
            visited.push(rule.id);
            async { PackageResult::Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(visited, expected);
}

#[tokio::test]
async fn iteration_stops_at_first_error() {
    let store = TestStore::new().await;
    let engine = RetentionEngine::new(&store.db);
    for name in ["a", "b", "c"] {
        let owner = store.create_user(name).await;
        engine
            .insert_rule(&rule(owner.id, PackageType::Generic, true))
            .await
            .unwrap();
    }

    let mut calls = 0;
    let result = engine
        .iterate_enabled_rules(|_| {
            calls += 1;
            let fail = calls == 2;
            async move {
                if fail {
                    Err(PackageError::InvalidArgument("stop".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;
    assert!(matches!(result, Err(PackageError::InvalidArgument(_))));
    assert_eq!(calls, 2);
}
