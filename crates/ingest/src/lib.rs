//! Shared ingestion pipeline plus its two entry points: direct upload
//! (`uploader`) and external-source sync (`walker` + `sync_runner`).

mod pipeline;
mod progress;
mod sync_runner;
mod uploader;
mod walker;

pub use pipeline::{IngestOutcome, IngestParams, ingest_entry};
pub use progress::{ProgressRegistry, idle_snapshot};
pub use sync_runner::{DRIVE_PROVIDER, SyncJobRunner, enqueue_sync_job, run_sync_dispatch_loop};
pub use uploader::{BatchResult, EntryReport, EntryStatus, UploadEntry, ingest_batch, preview_batch};
pub use walker::{WalkedFile, walk_folder};
