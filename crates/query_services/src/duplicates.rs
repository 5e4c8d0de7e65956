//! C14 — Duplicate Finder / Trash Reaper.

use common_types::Result;
use object_store_adapter::ObjectStore;
use photo_repository::{DuplicateGroup, PhotoStore};
use sqlx::PgPool;

/// Groups of live photos sharing a perceptual hash, largest group first.
pub async fn list_duplicates(pool: &PgPool, owner: &str) -> Result<Vec<DuplicateGroup>> {
    PhotoStore::duplicate_groups(pool, owner).await
}

/// Keeps the newest photo in every phash-duplicate group owned by
/// `owner` and hard-deletes the rest, including their storage objects
/// (spec.md §4.14). Storage cleanup errors are swallowed (the object may
/// already be gone) so DB progress is never blocked by a storage outage.
/// Returns the count of photos reaped.
pub async fn delete_all(pool: &PgPool, object_store: &dyn ObjectStore, owner: &str) -> Result<u64> {
    let groups = PhotoStore::duplicate_groups(pool, owner).await?;
    let mut reaped = 0u64;

    for group in groups {
        // `duplicate_groups` sorts each group newest-first; keep photos[0].
        for photo in group.photos.into_iter().skip(1) {
            if let Err(e) = object_store.delete(&photo.storage_key).await {
                tracing::warn!(photo_id = %photo.id, error = %e, "failed to delete photo object, continuing");
            }
            if let Err(e) = object_store.delete(&photo.thumbnail_key).await {
                tracing::warn!(photo_id = %photo.id, error = %e, "failed to delete thumbnail object, continuing");
            }
            PhotoStore::hard_delete(pool, &photo.id).await?;
            reaped += 1;
        }
    }

    tracing::info!(owner, reaped, "duplicate reaper pass complete");
    Ok(reaped)
}
