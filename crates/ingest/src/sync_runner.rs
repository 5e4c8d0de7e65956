//! C8 — Sync Job Runner: the hardest subsystem (spec.md §4.8). A worker
//! dequeues a `drive_sync_job_id`, walks the external folder, unpacks any
//! ZIP containers it meets along the way, and streams everything through
//! the shared ingestion pipeline in checkpointed batches.
//!
//! Single-owner-per-job discipline (spec.md §9): one `SyncJobRunner`
//! instance processes one job to completion; all counter mutation happens
//! inside `commit_batch`, so a crash mid-batch never desynchronizes
//! progress from what's actually durable.

use crate::pipeline::{IngestOutcome, IngestParams, ingest_entry};
use crate::progress::ProgressRegistry;
use crate::walker::{WalkedFile, walk_folder};
use clients::SourceClient;
use common_types::{
    Error, PhotoSource, RecentFailure, Result, SyncCounters, SyncPhase, SyncProgressSnapshot,
};
use job_queue::{DRIVE_SYNC_JOBS_CHANNEL, JobQueue};
use object_store_adapter::ObjectStore;
use photo_repository::{DriveSyncStore, UserStore};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub const DRIVE_PROVIDER: &str = "drive";

pub struct SyncJobRunner {
    pub pool: PgPool,
    pub object_store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub source_client: Arc<dyn SourceClient>,
    pub progress: Arc<ProgressRegistry>,
    pub batch_size: i32,
    pub max_attempts: i32,
    pub drive_max_bytes: u64,
    pub max_file_size_bytes: u64,
}

/// One image not yet committed: bytes already fetched, waiting to go
/// through `ingest_entry` as part of the next full or residual batch.
struct PendingEntry {
    source_file_id: String,
    /// `""` for a plain top-level image; the nested `::`-joined logical
    /// name for a ZIP entry.
    source_entry_id: String,
    filename: String,
    claimed_mime: Option<String>,
    bytes: Vec<u8>,
}

impl SyncJobRunner {
    /// Runs the full execution protocol for `job_id`: acquire, refresh
    /// auth, list, stream-ingest in batches, complete or fail.
    pub async fn run(&self, job_id: &str) -> Result<()> {
        let Some(job) = DriveSyncStore::acquire(&self.pool, job_id).await? else {
            tracing::warn!(job_id, "sync job not found, dropping");
            return Ok(());
        };

        self.publish(
            &job.owner,
            &job.id,
            job.batch_size,
            SyncPhase::Auth,
            0,
            "authenticating",
            &SyncCounters::default(),
            0,
            0,
        );

        let access_token = match self.refresh_token(&job.owner).await {
            Ok(token) => token,
            Err(Error::SourceAuthRevoked) => {
                DriveSyncStore::disable_sync_with_error(
                    &self.pool,
                    &job.owner,
                    "source authorization revoked",
                )
                .await?;
                DriveSyncStore::mark_failed(&self.pool, &job.id, "source authorization revoked")
                    .await?;
                return Ok(());
            }
            Err(e) => return self.handle_run_failure(&job.id, &job.owner, job.attempts, e).await,
        };

        let result = self.run_inner(&job.id, &job.owner, &job.folder, &access_token).await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => self.handle_run_failure(&job.id, &job.owner, job.attempts, e).await,
        }
    }

    async fn refresh_token(&self, owner: &str) -> Result<String> {
        let link = UserStore::find_oauth_link(&self.pool, &owner.to_string(), DRIVE_PROVIDER)
            .await?
            .ok_or(Error::SourceAuthRevoked)?;
        if link.is_revoked() {
            return Err(Error::SourceAuthRevoked);
        }
        self.source_client.refresh_access_token(&link.refresh_token).await
    }

    /// Step 6 of spec.md §4.8: on any propagated error, the in-flight DB
    /// work for the *current* batch was never committed (each batch
    /// commits independently), record `last_error`, and re-enqueue if
    /// attempts remain.
    async fn handle_run_failure(
        &self,
        job_id: &str,
        owner: &str,
        attempts: i32,
        err: Error,
    ) -> Result<()> {
        tracing::warn!(job_id, error = %err, "sync job run failed");
        DriveSyncStore::mark_failed(&self.pool, job_id, &err.to_string()).await?;

        if attempts < self.max_attempts {
            self.queue.push(DRIVE_SYNC_JOBS_CHANNEL, job_id).await?;
        } else {
            tracing::warn!(job_id, "sync job exhausted max_attempts, giving up");
        }

        self.publish(
            owner,
            job_id,
            self.batch_size,
            SyncPhase::Idle,
            0,
            &format!("failed: {err}"),
            &SyncCounters::default(),
            0,
            0,
        );
        Ok(())
    }

    async fn run_inner(
        &self,
        job_id: &str,
        owner: &str,
        folder: &str,
        access_token: &str,
    ) -> Result<()> {
        self.publish(owner, job_id, self.batch_size, SyncPhase::Listing, 0, "listing files", &SyncCounters::default(), 0, 0);
        let walked = walk_folder(self.source_client.as_ref(), access_token, folder).await?;

        let zip_total = walked.iter().filter(|f| is_zip(f)).count() as i64;
        let mut counters = SyncCounters {
            total_discovered: walked.len() as i64,
            ..SyncCounters::default()
        };
        DriveSyncStore::update_counters(&self.pool, job_id, counters).await?;

        let mut pending: Vec<PendingEntry> = Vec::new();
        let mut batch_no: i32 = 0;
        let mut zip_processed: i64 = 0;

        for file in &walked {
            if is_zip(file) {
                if DriveSyncStore::has_completion_marker(&self.pool, owner, &file.id).await? {
                    zip_processed += 1;
                    continue;
                }

                if !pending.is_empty() {
                    batch_no += 1;
                    let cancelled = self
                        .commit_batch(job_id, owner, batch_no, std::mem::take(&mut pending), &mut counters, zip_total, zip_processed)
                        .await?;
                    if cancelled {
                        return Ok(());
                    }
                }

                self.publish(
                    owner,
                    job_id,
                    self.batch_size,
                    SyncPhase::DownloadingZip,
                    batch_no,
                    &file.name,
                    &counters,
                    zip_total,
                    zip_processed,
                );
                batch_no = self
                    .ingest_zip_container(job_id, owner, file, batch_no, &mut pending, &mut counters, access_token, zip_total, zip_processed)
                    .await?;
                zip_processed += 1;
                continue;
            }

            if let Some(size) = file.size
                && size > self.drive_max_bytes
            {
                counters.failed += 1;
                counters.processed += 1;
                self.note_failure(owner, &file.name, "exceeds DRIVE_MAX");
                continue;
            }

            self.publish(owner, job_id, self.batch_size, SyncPhase::Importing, batch_no, &file.name, &counters, zip_total, zip_processed);
            let bytes = self.source_client.download(&file.id, access_token).await?;
            pending.push(PendingEntry {
                source_file_id: file.id.clone(),
                source_entry_id: String::new(),
                filename: file.name.clone(),
                claimed_mime: Some(file.mime_type.clone()),
                bytes,
            });

            if pending.len() as i32 >= self.batch_size {
                batch_no += 1;
                let cancelled = self
                    .commit_batch(job_id, owner, batch_no, std::mem::take(&mut pending), &mut counters, zip_total, zip_processed)
                    .await?;
                if cancelled {
                    return Ok(());
                }
            }
        }

        if !pending.is_empty() {
            batch_no += 1;
            let cancelled = self
                .commit_batch(job_id, owner, batch_no, std::mem::take(&mut pending), &mut counters, zip_total, zip_processed)
                .await?;
            if cancelled {
                return Ok(());
            }
        }

        DriveSyncStore::update_last_sync_at(&self.pool, owner).await?;
        DriveSyncStore::mark_completed(&self.pool, job_id).await?;
        let cancelled_count =
            DriveSyncStore::cancel_superseded(&self.pool, owner, folder, job_id).await?;
        if cancelled_count > 0 {
            tracing::info!(job_id, folder, cancelled_count, "superseded sibling sync jobs");
        }

        self.publish(owner, job_id, self.batch_size, SyncPhase::Completed, batch_no, "done", &counters, zip_total, zip_processed);
        Ok(())
    }

    /// Streams one ZIP container: commits the pending batch first (the
    /// caller already did this), downloads to a temp file, unpacks it,
    /// and appends/commits extracted entries in `batch_size` chunks.
    /// Returns the updated `batch_no`.
    #[allow(clippy::too_many_arguments)]
    async fn ingest_zip_container(
        &self,
        job_id: &str,
        owner: &str,
        file: &WalkedFile,
        mut batch_no: i32,
        pending: &mut Vec<PendingEntry>,
        counters: &mut SyncCounters,
        access_token: &str,
        zip_total: i64,
        zip_processed: i64,
    ) -> Result<i32> {
        let temp_archive =
            tempfile::NamedTempFile::new().map_err(|e| Error::Internal(e.to_string()))?;
        let owner_for_progress = owner.to_string();
        let job_for_progress = job_id.to_string();
        let progress = self.progress.clone();
        let batch_size = self.batch_size;
        let mut on_progress = move |downloaded: u64, total: Option<u64>| {
            let downloaded_mb = downloaded as f64 / (1024.0 * 1024.0);
            let total_mb = total.map(|t| t as f64 / (1024.0 * 1024.0));
            #[allow(clippy::cast_possible_truncation)]
            let percent = total.map(|t| ((downloaded * 100 / t.max(1)) as u8).min(100));
            let mut snapshot = progress
                .get(&owner_for_progress)
                .unwrap_or_else(|| crate::progress::idle_snapshot(&job_for_progress, batch_size));
            snapshot.phase = SyncPhase::DownloadingZip;
            snapshot.status = "running".to_string();
            snapshot.download_percent = percent;
            snapshot.downloaded_mb = Some(downloaded_mb);
            snapshot.download_total_mb = total_mb;
            progress.set(&owner_for_progress, snapshot);
        };

        self.source_client
            .download_to_path(&file.id, access_token, temp_archive.path(), &mut on_progress)
            .await?;

        let out_dir = tempfile::tempdir().map_err(|e| Error::Internal(e.to_string()))?;
        let extracted = zip_unpacker::extract_images(
            temp_archive.path(),
            out_dir.path(),
            self.max_file_size_bytes,
        )?;

        if extracted.is_empty() {
            counters.failed += 1;
            counters.processed += 1;
            self.note_failure(owner, &file.name, "archive contained no decodeable images");
        }

        let entries_total = extracted.len() as i64;
        let mut entries_done: i64 = 0;

        for entry in &extracted {
            let bytes = tokio::fs::read(&entry.path)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            pending.push(PendingEntry {
                source_file_id: file.id.clone(),
                source_entry_id: entry.logical_name.clone(),
                filename: format!("{}::{}", file.name, entry.logical_name),
                claimed_mime: Some(entry.mime.clone()),
                bytes,
            });
            entries_done += 1;
            self.publish_zip_entries(owner, job_id, batch_no, &*counters, zip_total, zip_processed, entries_total, entries_done);

            if pending.len() as i32 >= self.batch_size {
                batch_no += 1;
                self.commit_batch(job_id, owner, batch_no, std::mem::take(pending), counters, zip_total, zip_processed)
                    .await?;
            }
        }

        if !pending.is_empty() {
            batch_no += 1;
            self.commit_batch(job_id, owner, batch_no, std::mem::take(pending), counters, zip_total, zip_processed)
                .await?;
        }

        DriveSyncStore::write_completion_marker(&self.pool, job_id, owner, &file.id, batch_no)
            .await?;

        Ok(batch_no)
    }

    /// `commit_batch` from spec.md §4.8: upserts each `DriveSyncFile` row,
    /// runs the shared ingestion pipeline, updates counters and the
    /// job's checkpoint. Returns `true` if the job was observed to be
    /// `cancelled` (superseded) and the caller should stop before
    /// pushing further embedding jobs.
    async fn commit_batch(
        &self,
        job_id: &str,
        owner: &str,
        batch_no: i32,
        items: Vec<PendingEntry>,
        counters: &mut SyncCounters,
        zip_total: i64,
        zip_processed: i64,
    ) -> Result<bool> {
        if DriveSyncStore::is_cancelled(&self.pool, job_id).await? {
            tracing::info!(job_id, "job superseded, stopping before further embedding jobs");
            return Ok(true);
        }

        let mut last_success_key: Option<String> = None;

        for item in items {
            let file_row = DriveSyncStore::upsert_file(
                &self.pool,
                job_id,
                owner,
                &item.source_file_id,
                &item.source_entry_id,
            )
            .await?;

            if file_row.status() == common_types::DriveSyncFileStatus::Completed {
                counters.skipped += 1;
                counters.processed += 1;
                continue;
            }

            let source_id = composite_source_id(&item.source_file_id, &item.source_entry_id);
            let params = IngestParams {
                owner,
                filename: &item.filename,
                claimed_mime: item.claimed_mime.as_deref(),
                bytes: item.bytes,
                source: PhotoSource::Drive,
                source_id: Some(source_id.clone()),
                max_file_size_bytes: self.max_file_size_bytes,
            };

            let outcome = ingest_entry(&self.pool, self.object_store.as_ref(), self.queue.as_ref(), params)
                .await?;

            match outcome {
                IngestOutcome::Uploaded(_) => {
                    DriveSyncStore::mark_file_completed(&self.pool, &file_row.id, batch_no).await?;
                    counters.uploaded += 1;
                }
                IngestOutcome::Skipped { reason } => {
                    DriveSyncStore::mark_file_skipped(&self.pool, &file_row.id).await?;
                    counters.skipped += 1;
                    tracing::debug!(item = item.filename, reason, "drive sync entry skipped");
                }
                IngestOutcome::Failed { reason } => {
                    DriveSyncStore::mark_file_failed(&self.pool, &file_row.id, &reason).await?;
                    counters.failed += 1;
                    self.note_failure(owner, &item.filename, &reason);
                }
            }
            counters.processed += 1;
            last_success_key = Some(source_id);
        }

        DriveSyncStore::update_counters(&self.pool, job_id, *counters).await?;
        DriveSyncStore::upsert_checkpoint(&self.pool, job_id, batch_no, last_success_key.as_deref())
            .await?;

        self.publish(
            owner,
            job_id,
            self.batch_size,
            SyncPhase::Importing,
            batch_no,
            "committed batch",
            counters,
            zip_total,
            zip_processed,
        );

        Ok(false)
    }

    fn note_failure(&self, owner: &str, item: &str, reason: &str) {
        tracing::warn!(owner, item, reason, "sync entry failed");
        self.progress
            .record_failure(&owner.to_string(), item.to_string(), reason.to_string());
    }

    /// Publishes a full progress snapshot, folding in the counters
    /// accumulated so far and container-level ZIP progress (spec.md §4.8
    /// "Ordering and progress"). `zip_entries_total/processed` stay at
    /// the values already on the existing snapshot unless a more precise
    /// in-container update comes through `publish_zip_entries`.
    #[allow(clippy::too_many_arguments)]
    fn publish(
        &self,
        owner: &str,
        job_id: &str,
        batch_size: i32,
        phase: SyncPhase,
        current_batch: i32,
        message: &str,
        counters: &SyncCounters,
        zip_files_total: i64,
        zip_files_processed: i64,
    ) {
        let owner_id = owner.to_string();
        let existing = self.progress.get(&owner_id);
        let recent_failures: Vec<RecentFailure> =
            existing.as_ref().map(|s| s.recent_failures.clone()).unwrap_or_default();
        let (zip_entries_total, zip_entries_processed) = existing
            .as_ref()
            .map_or((0, 0), |s| (s.zip_entries_total, s.zip_entries_processed));

        let progress_percent = if counters.total_discovered > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let pct = ((counters.processed * 100) / counters.total_discovered).min(100) as u8;
            pct
        } else {
            0
        };

        let snapshot = SyncProgressSnapshot {
            status: if phase == SyncPhase::Completed {
                "done".to_string()
            } else {
                "running".to_string()
            },
            phase,
            job_id: job_id.to_string(),
            batch_size,
            current_batch,
            progress_percent,
            total_files: counters.total_discovered,
            processed_files: counters.processed,
            uploaded: counters.uploaded,
            skipped: counters.skipped,
            failed: counters.failed,
            zip_files_total,
            zip_files_processed,
            zip_entries_total,
            zip_entries_processed,
            download_percent: existing.as_ref().and_then(|s| s.download_percent),
            downloaded_mb: existing.as_ref().and_then(|s| s.downloaded_mb),
            download_total_mb: existing.as_ref().and_then(|s| s.download_total_mb),
            current_item: Some(message.to_string()),
            message: Some(message.to_string()),
            recent_failures,
        };
        self.progress.set(&owner_id, snapshot);
    }

    /// Updates just the ZIP entry-level counters on the existing snapshot
    /// without clobbering download progress or recent failures, called
    /// once per extracted entry while a container is being imported.
    #[allow(clippy::too_many_arguments)]
    fn publish_zip_entries(
        &self,
        owner: &str,
        job_id: &str,
        current_batch: i32,
        counters: &SyncCounters,
        zip_files_total: i64,
        zip_files_processed: i64,
        zip_entries_total: i64,
        zip_entries_processed: i64,
    ) {
        let owner_id = owner.to_string();
        let mut snapshot = self
            .progress
            .get(&owner_id)
            .unwrap_or_else(|| crate::progress::idle_snapshot(job_id, self.batch_size));
        snapshot.phase = SyncPhase::Extracting;
        snapshot.status = "running".to_string();
        snapshot.current_batch = current_batch;
        snapshot.total_files = counters.total_discovered;
        snapshot.processed_files = counters.processed;
        snapshot.uploaded = counters.uploaded;
        snapshot.skipped = counters.skipped;
        snapshot.failed = counters.failed;
        snapshot.zip_files_total = zip_files_total;
        snapshot.zip_files_processed = zip_files_processed;
        snapshot.zip_entries_total = zip_entries_total;
        snapshot.zip_entries_processed = zip_entries_processed;
        self.progress.set(&owner_id, snapshot);
    }
}

fn is_zip(file: &WalkedFile) -> bool {
    file.name.to_lowercase().ends_with(".zip")
}

fn composite_source_id(source_file_id: &str, source_entry_id: &str) -> String {
    if source_entry_id.is_empty() {
        source_file_id.to_string()
    } else {
        format!("{source_file_id}:{source_entry_id}")
    }
}

/// Enqueues a sync job row and pushes its id onto the durable queue, the
/// entrypoint used by the scheduler and any manual "sync now" trigger.
pub async fn enqueue_sync_job(
    pool: &PgPool,
    queue: &dyn JobQueue,
    owner: &str,
    folder: &str,
    batch_size: i32,
    max_attempts: i32,
) -> Result<String> {
    let job = DriveSyncStore::create_job(pool, owner, folder, batch_size, max_attempts).await?;
    queue.push(DRIVE_SYNC_JOBS_CHANNEL, &job.id).await?;
    Ok(job.id)
}

/// Blocking-pop loop used by `apps/worker` to dispatch sync jobs, mirroring
/// the embedding worker's consumer loop shape.
pub async fn run_sync_dispatch_loop(runner: Arc<SyncJobRunner>, queue: Arc<dyn JobQueue>) -> Result<()> {
    loop {
        match queue.pop(DRIVE_SYNC_JOBS_CHANNEL, Duration::from_secs(1)).await? {
            Some(job_id) => {
                if let Err(e) = runner.run(&job_id).await {
                    tracing::error!(job_id, error = %e, "sync job runner returned an error");
                }
            }
            None => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_source_id_is_plain_for_non_zip_entries() {
        assert_eq!(composite_source_id("file1", ""), "file1");
    }

    #[test]
    fn composite_source_id_joins_zip_entries() {
        assert_eq!(composite_source_id("file1", "a.jpg"), "file1:a.jpg");
    }
}
