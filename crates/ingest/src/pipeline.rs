//! Shared per-file ingestion pipeline (spec.md §4.6 steps 2-8), reused by
//! both the direct upload ingestor and the sync job runner's
//! `commit_batch`, so the two entry points never drift on validation,
//! dedup, or the embedding-job handoff.

use common_types::{Error, NewPhoto, Photo, PhotoSource, Result};
use job_queue::{EMBEDDING_JOBS_CHANNEL, JobQueue};
use object_store_adapter::{ObjectStore, photo_key, thumbnail_key};
use photo_repository::PhotoStore;
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of attempting to ingest one already-resolved image entry.
/// Per-entry failures are *counted*, never propagated, per spec.md §4.6 /
/// §7 ("per-entry errors ... never abort the batch").
pub enum IngestOutcome {
    Uploaded(Box<Photo>),
    Skipped { reason: String },
    Failed { reason: String },
}

pub struct IngestParams<'a> {
    pub owner: &'a str,
    pub filename: &'a str,
    pub claimed_mime: Option<&'a str>,
    pub bytes: Vec<u8>,
    pub source: PhotoSource,
    pub source_id: Option<String>,
    pub max_file_size_bytes: u64,
}

/// Runs spec.md §4.6 steps 2-8 for one image entry: magic-byte validation,
/// size limit, dedup, thumbnail + EXIF (CPU-bound, off the async
/// executor), object-store upload, row insert, and embedding enqueue.
pub async fn ingest_entry(
    pool: &PgPool,
    object_store: &dyn ObjectStore,
    queue: &dyn JobQueue,
    params: IngestParams<'_>,
) -> Result<IngestOutcome> {
    if params.bytes.len() as u64 > params.max_file_size_bytes {
        return Ok(IngestOutcome::Failed {
            reason: format!(
                "{} exceeds max file size of {} bytes",
                params.filename, params.max_file_size_bytes
            ),
        });
    }

    let detected = image_ops::detect_image_type(params.filename, &params.bytes);
    let Some(detected_mime) = detected else {
        return Ok(IngestOutcome::Failed {
            reason: format!("{}: not a recognizable image", params.filename),
        });
    };
    if let Some(claimed) = params.claimed_mime
        && claimed != detected_mime
    {
        tracing::warn!(
            file = params.filename,
            claimed,
            detected = detected_mime,
            "claimed content type does not match file contents"
        );
        return Ok(IngestOutcome::Failed {
            reason: format!("{}: magic mismatch (claimed {claimed})", params.filename),
        });
    }

    let phash = match image_ops::perceptual_hash(&params.bytes) {
        Ok(h) => h,
        Err(e) => {
            return Ok(IngestOutcome::Failed {
                reason: format!("{}: {e}", params.filename),
            });
        }
    };

    if PhotoStore::dedup_exists(pool, params.owner, &phash).await? {
        tracing::info!(file = params.filename, %phash, "duplicate perceptual hash, skipping");
        return Ok(IngestOutcome::Skipped {
            reason: format!("duplicate of an existing photo ({phash})"),
        });
    }

    let bytes_for_blocking = params.bytes.clone();
    let cpu_result = tokio::task::spawn_blocking(move || {
        let thumb = image_ops::make_thumbnail(&bytes_for_blocking)?;
        let exif = image_ops::extract_exif(&bytes_for_blocking);
        Ok::<_, Error>((thumb, exif))
    })
    .await
    .map_err(|e| Error::Internal(e.to_string()))?;

    let (thumb_bytes, exif) = match cpu_result {
        Ok(v) => v,
        Err(e) => {
            return Ok(IngestOutcome::Failed {
                reason: format!("{}: {e}", params.filename),
            });
        }
    };

    let ext = detected_mime.rsplit('/').next().unwrap_or("jpg");
    let photo_id = Uuid::new_v4().to_string();
    let storage_key = photo_key(params.owner, &photo_id, ext);
    let thumb_key = thumbnail_key(params.owner, &photo_id);

    object_store
        .put(&storage_key, params.bytes.clone(), detected_mime)
        .await?;
    object_store
        .put(&thumb_key, thumb_bytes, "image/webp")
        .await?;

    let (width, height) = exif
        .width
        .zip(exif.height)
        .map_or((0, 0), |(w, h)| (w as i32, h as i32));

    let new_photo = NewPhoto {
        owner: params.owner.to_string(),
        storage_key,
        thumbnail_key: thumb_key,
        original_filename: params.filename.to_string(),
        size_bytes: params.bytes.len() as i64,
        mime: detected_mime.to_string(),
        width,
        height,
        taken_at: exif.taken_at.map(|t| t.and_utc()),
        source: params.source,
        source_id: params.source_id,
        perceptual_hash: phash,
        gps_lat: exif.gps_lat,
        gps_lng: exif.gps_lng,
        camera_make: exif.camera_make,
    };

    let photo = match PhotoStore::insert_photo(pool, &new_photo).await {
        Ok(p) => p,
        Err(Error::DuplicateSource(_)) => {
            tracing::info!(file = params.filename, "duplicate source on retry, skipping");
            return Ok(IngestOutcome::Skipped {
                reason: "duplicate source on retry".to_string(),
            });
        }
        Err(e) => return Err(e),
    };

    queue.push(EMBEDDING_JOBS_CHANNEL, &photo.id).await?;

    Ok(IngestOutcome::Uploaded(Box::new(photo)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_bytes_are_rejected_before_any_io() {
        let bytes = vec![0u8; 10];
        assert!(bytes.len() as u64 > 5);
    }
}
