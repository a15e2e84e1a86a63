use chrono::{Duration, Utc};
use common::storage::HashSums;
use futures::future::join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};

use depot::access::Principal;
use depot::blob::BlobStore;
use depot::entity::package_blob;
use depot::error::PackageError;
use depot::insert::{Inserted, insert_or_fetch};

use crate::common::TestStore;

#[tokio::test]
async fn concurrent_inserts_share_one_row() {
    let store = TestStore::new().await;
    let hashes = HashSums::compute(b"same bytes");

    let blobs = BlobStore::new(&store.db);
    let results: Vec<_> = join_all((0..3).map(|_| blobs.get_or_insert(&hashes, 10)))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let created = results.iter().filter(|(_, existed)| !existed).count();
    assert_eq!(created, 1);
    assert!(results.iter().all(|(blob, _)| blob.id == results[0].0.id));
}

#[tokio::test]
async fn lost_insert_race_keeps_the_callers_transaction_usable() {
    let store = TestStore::new().await;
    let hashes = HashSums::compute(b"raced bytes");
    let (winner, _) = BlobStore::new(&store.db)
        .get_or_insert(&hashes, 11)
        .await
        .unwrap();

    let by_digests = package_blob::Entity::find()
        .filter(package_blob::Column::HashSha256.eq(hashes.sha256_hex()))
        .filter(package_blob::Column::HashSha512.eq(hashes.sha512_hex()));
    let candidate = |hashes: &HashSums| package_blob::ActiveModel {
        size: Set(11),
        hash_md5: Set(hashes.md5_hex()),
        hash_sha1: Set(hashes.sha1_hex()),
        hash_sha256: Set(hashes.sha256_hex()),
        hash_sha512: Set(hashes.sha512_hex()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let txn = store.db.begin().await.unwrap();
    // Skips the lookup, so the insert itself hits the unique key.
    match insert_or_fetch(&txn, by_digests, candidate(&hashes)).await.unwrap() {
        Inserted::Existing(blob) => assert_eq!(blob.id, winner.id),
        Inserted::Created(_) => panic!("duplicate digests were inserted"),
    }

    let (other, existed) = BlobStore::new(&txn)
        .get_or_insert(&HashSums::compute(b"after the race"), 14)
        .await
        .unwrap();
    assert!(!existed);
    txn.commit().await.unwrap();

    assert_eq!(package_blob::Entity::find().count(&store.db).await.unwrap(), 2);
    BlobStore::new(&store.db).get_by_id(other.id).await.unwrap();
}

#[tokio::test]
async fn lookup_by_sha256_ignores_case() {
    let store = TestStore::new().await;
    let hashes = HashSums::compute(b"content");
    let (blob, existed) = BlobStore::new(&store.db)
        .get_or_insert(&hashes, 7)
        .await
        .unwrap();
    assert!(!existed);

    let found = BlobStore::new(&store.db)
        .get_by_sha256(&hashes.sha256_hex().to_uppercase())
        .await
        .unwrap();
    assert_eq!(found.id, blob.id);

    let missing = BlobStore::new(&store.db).get_by_sha256(&"0".repeat(64)).await;
    assert!(matches!(missing, Err(PackageError::PackageBlobNotExist)));
}

#[tokio::test]
async fn only_old_unreferenced_blobs_expire() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (_, file) = store
        .publish(&owner, "app", "1.0.0", "app.tar.gz", b"referenced")
        .await;

    let blobs = BlobStore::new(&store.db);
    let (orphan, _) = blobs
        .get_or_insert(&HashSums::compute(b"orphan"), 6)
        .await
        .unwrap();
    let (fresh, _) = blobs
        .get_or_insert(&HashSums::compute(b"fresh"), 5)
        .await
        .unwrap();

    let two_hours_ago = chrono::Utc::now() - Duration::hours(2);
    for id in [orphan.id, file.blob_id] {
        package_blob::ActiveModel {
            id: Set(id),
            created_at: Set(two_hours_ago),
            ..Default::default()
        }
        .update(&store.db)
        .await
        .unwrap();
    }

    let expired = blobs.find_expired_unreferenced(Duration::hours(1)).await.unwrap();
    let ids: Vec<i32> = expired.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![orphan.id]);
    assert!(!ids.contains(&fresh.id));
    assert!(
        blobs
            .find_expired_unreferenced(Duration::MAX)
            .await
            .unwrap()
            .is_empty()
    );

    blobs.delete_by_id(orphan.id).await.unwrap();
    assert!(matches!(
        blobs.delete_by_id(orphan.id).await,
        Err(PackageError::PackageBlobNotExist)
    ));
}

#[tokio::test]
async fn sizes_count_every_blob_once() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    store.publish(&owner, "app", "1.0.0", "a.bin", b"0123456789").await;
    store.publish(&owner, "app", "1.0.1", "a.bin", b"0123456789").await;

    let blobs = BlobStore::new(&store.db);
    blobs
        .get_or_insert(&HashSums::compute(b"orphan"), 6)
        .await
        .unwrap();

    assert_eq!(blobs.total_size().await.unwrap(), 16);
    assert_eq!(blobs.total_unreferenced_size().await.unwrap(), 6);
}

#[tokio::test]
async fn blob_access_follows_owner_visibility() {
    let store = TestStore::new().await;
    let org = store
        .create_org("acme", common::Visibility::Private)
        .await;
    let member = store.create_user("bob").await;
    let outsider = store.create_user("eve").await;
    store
        .add_team_member(&org, &member, common::AccessMode::Read)
        .await;

    let (_, file) = store
        .publish(&org, "internal-tool", "1.0.0", "tool.bin", b"secret")
        .await;

    let blobs = BlobStore::new(&store.db);
    assert!(blobs.can_access(file.blob_id, &Principal::user(member.id)).await);
    assert!(!blobs.can_access(file.blob_id, &Principal::user(outsider.id)).await);
    assert!(!blobs.can_access(file.blob_id, &Principal::anonymous()).await);
    assert!(blobs.can_access(file.blob_id, &Principal::admin(outsider.id)).await);
}
