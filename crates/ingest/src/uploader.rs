//! C6 — Upload Ingestor: accepts a batch of files/ZIPs, validates,
//! dedups, persists, and enqueues embedding jobs (spec.md §4.6).

use crate::pipeline::{IngestOutcome, IngestParams, ingest_entry};
use common_types::{Error, PhotoSource, Result};
use job_queue::JobQueue;
use object_store_adapter::ObjectStore;
use photo_repository::PhotoStore;
use sqlx::PgPool;

/// One file as submitted by the caller: claimed mime/filename plus bytes.
/// ZIPs are expanded transparently by `ingest_batch`.
pub struct UploadEntry {
    pub filename: String,
    pub claimed_mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-entry diagnostic, supplementing the bare `{uploaded, skipped,
/// failed}` counters with a reason string — the original upload endpoint
/// returns per-file error detail to the caller and nothing in spec.md
/// forbids richer per-item diagnostics (see SPEC_FULL.md §C6).
#[derive(Debug, Clone)]
pub struct EntryReport {
    pub name: String,
    pub outcome: EntryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Uploaded,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub uploaded: u32,
    pub skipped: u32,
    pub failed: u32,
    pub details: Vec<EntryReport>,
}

const MAX_ZIP_DEPTH_ENTRY_BYTES_DEFAULT: u64 = 50 * 1024 * 1024;

/// Runs the full 8-step pipeline for every entry in `entries`, expanding
/// ZIPs via the unpacker first. Storage errors abort the whole batch with
/// `StorageUnavailable`; per-entry decode/hash errors are counted and the
/// batch continues (spec.md §4.6, §7).
pub async fn ingest_batch(
    pool: &PgPool,
    object_store: &dyn ObjectStore,
    queue: &dyn JobQueue,
    owner: &str,
    entries: Vec<UploadEntry>,
    max_file_size_bytes: u64,
) -> Result<BatchResult> {
    let mut result = BatchResult::default();

    for entry in entries {
        if is_zip(&entry.filename, &entry.bytes) {
            ingest_zip_entry(
                pool,
                object_store,
                queue,
                owner,
                &entry,
                max_file_size_bytes,
                &mut result,
            )
            .await?;
            continue;
        }

        let params = IngestParams {
            owner,
            filename: &entry.filename,
            claimed_mime: entry.claimed_mime.as_deref(),
            bytes: entry.bytes,
            source: PhotoSource::Manual,
            source_id: None,
            max_file_size_bytes,
        };
        record_outcome(
            &entry.filename,
            ingest_entry(pool, object_store, queue, params).await?,
            &mut result,
        );
    }

    Ok(result)
}

async fn ingest_zip_entry(
    pool: &PgPool,
    object_store: &dyn ObjectStore,
    queue: &dyn JobQueue,
    owner: &str,
    entry: &UploadEntry,
    max_file_size_bytes: u64,
    result: &mut BatchResult,
) -> Result<()> {
    let temp_archive = tempfile::NamedTempFile::new().map_err(|e| Error::Internal(e.to_string()))?;
    tokio::fs::write(temp_archive.path(), &entry.bytes)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
    let out_dir = tempfile::tempdir().map_err(|e| Error::Internal(e.to_string()))?;

    let extracted = zip_unpacker::extract_images(
        temp_archive.path(),
        out_dir.path(),
        max_file_size_bytes.max(MAX_ZIP_DEPTH_ENTRY_BYTES_DEFAULT),
    )?;

    if extracted.is_empty() {
        result.failed += 1;
        result.details.push(EntryReport {
            name: entry.filename.clone(),
            outcome: EntryStatus::Failed("archive contained no decodeable images".to_string()),
        });
        return Ok(());
    }

    for item in extracted {
        let bytes = tokio::fs::read(&item.path)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        let logical_name = format!("{}::{}", entry.filename, item.logical_name);
        let params = IngestParams {
            owner,
            filename: &logical_name,
            claimed_mime: Some(item.mime.as_str()),
            bytes,
            source: PhotoSource::Manual,
            source_id: None,
            max_file_size_bytes,
        };
        record_outcome(
            &logical_name,
            ingest_entry(pool, object_store, queue, params).await?,
            result,
        );
    }

    Ok(())
}

fn record_outcome(name: &str, outcome: IngestOutcome, result: &mut BatchResult) {
    let status = match outcome {
        IngestOutcome::Uploaded(_) => {
            result.uploaded += 1;
            EntryStatus::Uploaded
        }
        IngestOutcome::Skipped { reason } => {
            result.skipped += 1;
            EntryStatus::Skipped(reason.clone())
        }
        IngestOutcome::Failed { reason } => {
            result.failed += 1;
            EntryStatus::Failed(reason.clone())
        }
    };
    result.details.push(EntryReport {
        name: name.to_string(),
        outcome: status,
    });
}

fn is_zip(filename: &str, bytes: &[u8]) -> bool {
    filename.to_lowercase().ends_with(".zip") || bytes.starts_with(b"PK\x03\x04")
}

/// Steps 1-4 only (expand ZIPs, validate magic bytes, size limit, dedup
/// check) with no writes, for the separate `preview` endpoint named in
/// spec.md §4.6.
pub async fn preview_batch(
    pool: &PgPool,
    owner: &str,
    entries: &[UploadEntry],
    max_file_size_bytes: u64,
) -> Result<BatchResult> {
    let mut result = BatchResult::default();

    for entry in entries {
        if entry.bytes.len() as u64 > max_file_size_bytes {
            result.failed += 1;
            result.details.push(EntryReport {
                name: entry.filename.clone(),
                outcome: EntryStatus::Failed("exceeds max file size".to_string()),
            });
            continue;
        }

        let Some(detected) = image_ops::detect_image_type(&entry.filename, &entry.bytes) else {
            if is_zip(&entry.filename, &entry.bytes) {
                result.uploaded += 1;
                result.details.push(EntryReport {
                    name: entry.filename.clone(),
                    outcome: EntryStatus::Uploaded,
                });
            } else {
                result.failed += 1;
                result.details.push(EntryReport {
                    name: entry.filename.clone(),
                    outcome: EntryStatus::Failed("not a recognizable image".to_string()),
                });
            }
            continue;
        };

        if let Some(claimed) = &entry.claimed_mime
            && claimed != detected
        {
            result.failed += 1;
            result.details.push(EntryReport {
                name: entry.filename.clone(),
                outcome: EntryStatus::Failed("magic mismatch".to_string()),
            });
            continue;
        }

        let phash = image_ops::perceptual_hash(&entry.bytes)?;
        if PhotoStore::dedup_exists(pool, owner, &phash).await? {
            result.skipped += 1;
            result.details.push(EntryReport {
                name: entry.filename.clone(),
                outcome: EntryStatus::Skipped("duplicate".to_string()),
            });
            continue;
        }

        result.uploaded += 1;
        result.details.push(EntryReport {
            name: entry.filename.clone(),
            outcome: EntryStatus::Uploaded,
        });
    }

    Ok(result)
}
