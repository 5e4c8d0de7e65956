use chrono::Utc;
use common_types::{
    DriveSyncCheckpoint, DriveSyncFile, DriveSyncJob, DriveSyncState, Error, Result, SyncCounters,
    SyncJobStatus, ZIP_COMPLETION_MARKER, new_id,
};
use sqlx::{Executor, Postgres};

const JOB_COLUMNS: &str = r"
    id, owner, folder, status, attempts, max_attempts, batch_size,
    total_discovered, processed, uploaded, skipped, failed,
    created_at, started_at, finished_at, last_error
";

const FILE_COLUMNS: &str = r"
    id, job_id, owner, source_file_id, source_entry_id, status, batch_no, error, processed_at
";

pub struct DriveSyncStore;

impl DriveSyncStore {
    // ---- DriveSyncJob -------------------------------------------------

    pub async fn create_job(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        folder: &str,
        batch_size: i32,
        max_attempts: i32,
    ) -> Result<DriveSyncJob> {
        let id = new_id();
        sqlx::query_as::<_, DriveSyncJob>(&format!(
            r"
            INSERT INTO drive_sync_jobs (id, owner, folder, status, batch_size, max_attempts)
            VALUES ($1, $2, $3, 'queued', $4, $5)
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(&id)
        .bind(owner)
        .bind(folder)
        .bind(batch_size)
        .bind(max_attempts)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn find_job(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
    ) -> Result<Option<DriveSyncJob>> {
        sqlx::query_as::<_, DriveSyncJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM drive_sync_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    /// Acquires ownership of a queued/failed job: increments `attempts`,
    /// sets `started_at`, status -> `running` (spec.md §4.8 step 1).
    pub async fn acquire(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
    ) -> Result<Option<DriveSyncJob>> {
        sqlx::query_as::<_, DriveSyncJob>(&format!(
            r"
            UPDATE drive_sync_jobs
            SET status = 'running', attempts = attempts + 1, started_at = now()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(job_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn update_counters(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
        counters: SyncCounters,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE drive_sync_jobs
            SET total_discovered = $2, processed = $3, uploaded = $4, skipped = $5, failed = $6
            WHERE id = $1
            ",
        )
        .bind(job_id)
        .bind(counters.total_discovered)
        .bind(counters.processed)
        .bind(counters.uploaded)
        .bind(counters.skipped)
        .bind(counters.failed)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_completed(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_jobs SET status = 'completed', finished_at = now() WHERE id = $1",
        )
        .bind(job_id)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_failed(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_jobs SET status = 'failed', finished_at = now(), last_error = $2 WHERE id = $1",
        )
        .bind(job_id)
        .bind(error)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    /// Returns true if the job's own status is `cancelled` — checked at
    /// each batch commit so a superseded run stops before pushing further
    /// embedding jobs (spec.md §4.8 "Cancellation").
    pub async fn is_cancelled(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
    ) -> Result<bool> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM drive_sync_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(executor)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(status.map(|s| SyncJobStatus::from_db_str(&s)) == Some(SyncJobStatus::Cancelled))
    }

    /// Transitions sibling jobs for the same `(owner, folder)` still in
    /// `{queued, running, failed}` to `cancelled` with a superseded note,
    /// per spec.md §4.8.
    pub async fn cancel_superseded(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        folder: &str,
        except_job_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE drive_sync_jobs
            SET status = 'cancelled', finished_at = now(), last_error = 'superseded'
            WHERE owner = $1 AND folder = $2 AND id <> $3
              AND status IN ('queued', 'running', 'failed')
            ",
        )
        .bind(owner)
        .bind(folder)
        .bind(except_job_id)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(result.rows_affected())
    }

    // ---- DriveSyncFile --------------------------------------------------

    /// Upserts a file's entry row. Returns the row as it stands after the
    /// upsert; if it already existed the caller compares `status()`
    /// against `Completed` to decide skip vs. re-attempt (idempotency
    /// anchor, spec.md §4.8 step 4 / `commit_batch`).
    pub async fn upsert_file(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
        owner: &str,
        source_file_id: &str,
        source_entry_id: &str,
    ) -> Result<DriveSyncFile> {
        if let Some(existing) = sqlx::query_as::<_, DriveSyncFile>(&format!(
            r"SELECT {FILE_COLUMNS} FROM drive_sync_files
               WHERE owner = $1 AND source_file_id = $2 AND source_entry_id = $3"
        ))
        .bind(owner)
        .bind(source_file_id)
        .bind(source_entry_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        {
            return Ok(existing);
        }

        let id = new_id();
        sqlx::query_as::<_, DriveSyncFile>(&format!(
            r"
            INSERT INTO drive_sync_files (id, job_id, owner, source_file_id, source_entry_id, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT (owner, source_file_id, source_entry_id) DO UPDATE SET owner = EXCLUDED.owner
            RETURNING {FILE_COLUMNS}
            "
        ))
        .bind(&id)
        .bind(job_id)
        .bind(owner)
        .bind(source_file_id)
        .bind(source_entry_id)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn has_completion_marker(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        source_file_id: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM drive_sync_files
                WHERE owner = $1 AND source_file_id = $2
                  AND source_entry_id = $3 AND status = 'completed'
            )
            ",
        )
        .bind(owner)
        .bind(source_file_id)
        .bind(ZIP_COMPLETION_MARKER)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(exists)
    }

    pub async fn write_completion_marker(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
        owner: &str,
        source_file_id: &str,
        batch_no: i32,
    ) -> Result<()> {
        let id = new_id();
        sqlx::query(
            r"
            INSERT INTO drive_sync_files (id, job_id, owner, source_file_id, source_entry_id, status, batch_no, processed_at)
            VALUES ($1, $2, $3, $4, $5, 'completed', $6, now())
            ON CONFLICT (owner, source_file_id, source_entry_id)
            DO UPDATE SET status = 'completed', batch_no = EXCLUDED.batch_no, processed_at = now()
            ",
        )
        .bind(&id)
        .bind(job_id)
        .bind(owner)
        .bind(source_file_id)
        .bind(ZIP_COMPLETION_MARKER)
        .bind(batch_no)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_file_completed(
        executor: impl Executor<'_, Database = Postgres>,
        file_id: &str,
        batch_no: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_files SET status = 'completed', batch_no = $2, processed_at = now() WHERE id = $1",
        )
        .bind(file_id)
        .bind(batch_no)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_file_failed(
        executor: impl Executor<'_, Database = Postgres>,
        file_id: &str,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_files SET status = 'failed', error = $2, processed_at = now() WHERE id = $1",
        )
        .bind(file_id)
        .bind(error)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_file_skipped(
        executor: impl Executor<'_, Database = Postgres>,
        file_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_files SET status = 'skipped', processed_at = now() WHERE id = $1",
        )
        .bind(file_id)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    // ---- DriveSyncCheckpoint -------------------------------------------

    pub async fn upsert_checkpoint(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
        batch_no: i32,
        last_success_key: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO drive_sync_checkpoints (job_id, last_batch_no, last_success_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id) DO UPDATE SET last_batch_no = $2, last_success_key = $3
            ",
        )
        .bind(job_id)
        .bind(batch_no)
        .bind(last_success_key)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_checkpoint(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: &str,
    ) -> Result<Option<DriveSyncCheckpoint>> {
        sqlx::query_as::<_, DriveSyncCheckpoint>(
            "SELECT job_id, last_batch_no, last_success_key FROM drive_sync_checkpoints WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    // ---- DriveSyncState --------------------------------------------------

    pub async fn get_state(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<Option<DriveSyncState>> {
        sqlx::query_as::<_, DriveSyncState>(
            r"
            SELECT owner, folder_id, sync_enabled, last_sync_at, last_error,
                   total_discovered, processed, uploaded, skipped, failed
            FROM drive_sync_state WHERE owner = $1
            ",
        )
        .bind(owner)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn list_enabled(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<Vec<DriveSyncState>> {
        sqlx::query_as::<_, DriveSyncState>(
            r"
            SELECT owner, folder_id, sync_enabled, last_sync_at, last_error,
                   total_discovered, processed, uploaded, skipped, failed
            FROM drive_sync_state
            WHERE sync_enabled = true AND folder_id IS NOT NULL
            ",
        )
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn update_last_sync_at(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_state SET last_sync_at = $2 WHERE owner = $1",
        )
        .bind(owner)
        .bind(Utc::now())
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    /// Disables sync and records a user-visible error, used when the
    /// source's OAuth link is revoked (spec.md §7).
    pub async fn disable_sync_with_error(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE drive_sync_state SET sync_enabled = false, last_error = $2 WHERE owner = $1",
        )
        .bind(owner)
        .bind(error)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }
}
