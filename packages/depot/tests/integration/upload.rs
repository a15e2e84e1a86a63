use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Set};

use depot::entity::package_blob_upload;
use depot::error::PackageError;
use depot::upload::UploadTracker;

use crate::common::TestStore;

#[tokio::test]
async fn upload_progress_is_recorded() {
    let store = TestStore::new().await;
    let tracker = UploadTracker::new(&store.db);

    let upload = tracker.create().await.unwrap();
    assert_eq!(upload.bytes_received, 0);
    assert!(upload.hash_state.is_empty());

    let mut progress = tracker.get_by_id(&upload.id).await.unwrap();
    progress.bytes_received = 4096;
    progress.hash_state = vec![1, 2, 3];
    let updated = tracker.update(&progress).await.unwrap();
    assert_eq!(updated.bytes_received, 4096);
    assert_eq!(updated.hash_state, vec![1, 2, 3]);
    assert!(updated.updated_at >= upload.updated_at);

    tracker.delete_by_id(&upload.id).await.unwrap();
    assert!(matches!(
        tracker.get_by_id(&upload.id).await,
        Err(PackageError::BlobUploadNotExist)
    ));
    assert!(matches!(
        tracker.update(&progress).await,
        Err(PackageError::BlobUploadNotExist)
    ));
}

#[tokio::test]
async fn only_stale_uploads_expire() {
    let store = TestStore::new().await;
    let tracker = UploadTracker::new(&store.db);
    let stale = tracker.create().await.unwrap();
    let recent = tracker.create().await.unwrap();
    let fresh = tracker.create().await.unwrap();

    for (id, age) in [(&stale.id, Duration::hours(2)), (&recent.id, Duration::minutes(30))] {
        package_blob_upload::ActiveModel {
            id: Set(id.clone()),
            updated_at: Set(Utc::now() - age),
            ..Default::default()
        }
        .update(&store.db)
        .await
        .unwrap();
    }

    let expired = tracker.find_expired(Duration::hours(1)).await.unwrap();
    let ids: Vec<_> = expired.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec![stale.id.as_str()]);
    assert_ne!(fresh.id, stale.id);
    assert!(tracker.find_expired(Duration::MAX).await.unwrap().is_empty());
}
