use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Id;

/// Sentinel `source_entry_id` used on a `DriveSyncFile` row to record that
/// a ZIP container has been fully consumed. The spec requires a
/// distinguished sentinel but leaves its literal form to the
/// implementation (spec.md §9, Open Questions).
pub const ZIP_COMPLETION_MARKER: &str = "__zip_complete__";

/// One per user: selected folder, sync toggle, and running counters.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DriveSyncState {
    pub owner: Id,
    pub folder_id: Option<String>,
    pub sync_enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_discovered: i64,
    pub processed: i64,
    pub uploaded: i64,
    pub skipped: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncJobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncJobStatus {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            SyncJobStatus::Queued => "queued",
            SyncJobStatus::Running => "running",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
            SyncJobStatus::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "running" => SyncJobStatus::Running,
            "completed" => SyncJobStatus::Completed,
            "failed" => SyncJobStatus::Failed,
            "cancelled" => SyncJobStatus::Cancelled,
            _ => SyncJobStatus::Queued,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncJobStatus::Completed | SyncJobStatus::Cancelled
        )
    }
}

/// Per-run counters, threaded through `DriveSyncJob` and the progress
/// snapshot rather than duplicated as four bare fields in both places.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncCounters {
    pub total_discovered: i64,
    pub processed: i64,
    pub uploaded: i64,
    pub skipped: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DriveSyncJob {
    pub id: Id,
    pub owner: Id,
    pub folder: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub batch_size: i32,
    pub total_discovered: i64,
    pub processed: i64,
    pub uploaded: i64,
    pub skipped: i64,
    pub failed: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DriveSyncJob {
    #[must_use]
    pub fn status(&self) -> SyncJobStatus {
        SyncJobStatus::from_db_str(&self.status)
    }

    #[must_use]
    pub fn counters(&self) -> SyncCounters {
        SyncCounters {
            total_discovered: self.total_discovered,
            processed: self.processed,
            uploaded: self.uploaded,
            skipped: self.skipped,
            failed: self.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveSyncFileStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl DriveSyncFileStatus {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            DriveSyncFileStatus::Pending => "pending",
            DriveSyncFileStatus::Completed => "completed",
            DriveSyncFileStatus::Failed => "failed",
            DriveSyncFileStatus::Skipped => "skipped",
        }
    }
}

/// Per-source-entry ingestion state. `(owner, source_file_id,
/// source_entry_id)` is unique; this is the idempotency anchor that lets a
/// sync job be safely re-attempted after a crash.
#[derive(Debug, Clone, FromRow)]
pub struct DriveSyncFile {
    pub id: Id,
    pub job_id: Id,
    pub owner: Id,
    pub source_file_id: String,
    pub source_entry_id: String,
    pub status: String,
    pub batch_no: Option<i32>,
    pub error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl DriveSyncFile {
    #[must_use]
    pub fn status(&self) -> DriveSyncFileStatus {
        match self.status.as_str() {
            "completed" => DriveSyncFileStatus::Completed,
            "failed" => DriveSyncFileStatus::Failed,
            "skipped" => DriveSyncFileStatus::Skipped,
            _ => DriveSyncFileStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DriveSyncCheckpoint {
    pub job_id: Id,
    pub last_batch_no: i32,
    pub last_success_key: Option<String>,
}

/// Phase of a running sync job, published in the progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Queued,
    Auth,
    Listing,
    DownloadingZip,
    Extracting,
    Importing,
    Completed,
    Idle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentFailure {
    pub item: String,
    pub reason: String,
}

/// Process-local, non-authoritative progress record for the sync status
/// endpoint (spec.md §6). Rebuilt from DB counters on restart; never the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgressSnapshot {
    pub status: String,
    pub phase: SyncPhase,
    pub job_id: Id,
    pub batch_size: i32,
    pub current_batch: i32,
    pub progress_percent: u8,
    pub total_files: i64,
    pub processed_files: i64,
    pub uploaded: i64,
    pub skipped: i64,
    pub failed: i64,
    pub zip_files_total: i64,
    pub zip_files_processed: i64,
    pub zip_entries_total: i64,
    pub zip_entries_processed: i64,
    pub download_percent: Option<u8>,
    pub downloaded_mb: Option<f64>,
    pub download_total_mb: Option<f64>,
    pub current_item: Option<String>,
    pub message: Option<String>,
    pub recent_failures: Vec<RecentFailure>,
}

/// Bounded ring buffer of the last 10 per-entry failures for a sync job.
#[derive(Debug, Clone, Default)]
pub struct RecentFailureRing {
    buf: std::collections::VecDeque<RecentFailure>,
}

impl RecentFailureRing {
    const CAPACITY: usize = 10;

    pub fn push(&mut self, item: String, reason: String) {
        if self.buf.len() == Self::CAPACITY {
            self.buf.pop_front();
        }
        self.buf.push_back(RecentFailure { item, reason });
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<RecentFailure> {
        self.buf.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_keeps_only_last_ten() {
        let mut ring = RecentFailureRing::default();
        for i in 0..15 {
            ring.push(format!("item-{i}"), "boom".into());
        }
        let items = ring.to_vec();
        assert_eq!(items.len(), 10);
        assert_eq!(items.first().unwrap().item, "item-5");
        assert_eq!(items.last().unwrap().item, "item-14");
    }
}
