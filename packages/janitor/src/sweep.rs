use std::time::Duration;

use common::storage::ContentHash;
use depot::cleanup::PatternCache;
use depot::{BlobStore, PackageService, UploadTracker};
use tracing::{error, info};

use crate::config::JanitorConfig;
use crate::retention::apply_cleanup_rules;

/// Run sweeps every `interval_secs` until the process exits.
pub async fn run_janitor(service: PackageService, config: JanitorConfig) {
    info!(
        interval_secs = config.interval_secs,
        upload_ttl_secs = config.upload_ttl_secs,
        blob_ttl_secs = config.blob_ttl_secs,
        "Starting package janitor"
    );

    let cache = PatternCache::new();
    // A zero period would panic in tokio.
    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

    loop {
        interval.tick().await;
        sweep(&service, &cache, &config).await;
    }
}

/// One pass over uploads, cleanup rules and blobs. Each step logs its own
/// failures so a broken step does not hold up the others.
pub async fn sweep(service: &PackageService, cache: &PatternCache, config: &JanitorConfig) {
    if let Err(e) = expire_uploads(service, config.upload_ttl()).await {
        error!(error = %e, "Upload expiry failed");
    }

    if !config.skip_rules {
        match apply_cleanup_rules(service, cache).await {
            Ok(removed) if removed > 0 => info!(removed, "Cleanup rules removed package versions"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Cleanup rule sweep failed"),
        }
    }

    if let Err(e) = collect_blobs(service, config.blob_ttl()).await {
        error!(error = %e, "Blob collection failed");
    }
}

/// Delete uploads without progress for longer than `ttl`.
pub async fn expire_uploads(
    service: &PackageService,
    ttl: chrono::Duration,
) -> anyhow::Result<usize> {
    let tracker = UploadTracker::new(service.db());
    let expired = tracker.find_expired(ttl).await?;
    if expired.is_empty() {
        return Ok(0);
    }

    info!(count = expired.len(), "Found expired uploads");

    let mut deleted = 0;
    for upload in expired {
        match tracker.delete_by_id(&upload.id).await {
            Ok(()) => deleted += 1,
            Err(e) if e.is_not_exist() => {}
            Err(e) => error!(
                upload_id = %upload.id,
                error = %e,
                "Failed to delete expired upload"
            ),
        }
    }
    Ok(deleted)
}

/// Delete blobs no file has referenced for longer than `ttl`, rows first,
/// then content.
pub async fn collect_blobs(
    service: &PackageService,
    ttl: chrono::Duration,
) -> anyhow::Result<usize> {
    let blobs = BlobStore::new(service.db());
    let unreferenced = blobs.find_expired_unreferenced(ttl).await?;
    if unreferenced.is_empty() {
        return Ok(0);
    }

    info!(count = unreferenced.len(), "Found unreferenced blobs");

    let mut deleted = 0;
    for blob in unreferenced {
        if let Err(e) = blobs.delete_by_id(blob.id).await {
            // A file may have picked the blob up since it was listed.
            error!(blob_id = blob.id, error = %e, "Failed to delete package blob");
            continue;
        }
        deleted += 1;

        let key = match ContentHash::from_hex(&blob.hash_sha256) {
            Ok(key) => key,
            Err(e) => {
                error!(blob_id = blob.id, error = %e, "Package blob has a malformed digest");
                continue;
            }
        };
        if let Err(e) = service.content().delete(&key).await {
            error!(
                blob_id = blob.id,
                sha256 = %key,
                error = %e,
                "Failed to delete package blob content"
            );
        }
    }
    Ok(deleted)
}
