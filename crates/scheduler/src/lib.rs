//! C13 — Scheduler: `drive_sync_all_users` on a 30-minute interval,
//! `daily_memories` once a day at 08:00 local time.
//!
//! A standalone `tokio::time::interval` loop rather than a cron-job
//! framework, since nothing else in this workspace pulls in loco-rs.

use chrono::{Local, NaiveTime, Timelike};
use common_types::Result;
use job_queue::JobQueue;
use photo_repository::DriveSyncStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const DRIVE_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);
const DAILY_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const MEMORIES_HOUR: u32 = 8;

/// Enqueues a sync job for every user with `sync_enabled` and a folder
/// selected. Returns how many jobs were enqueued.
pub async fn drive_sync_all_users(
    pool: &PgPool,
    queue: &dyn JobQueue,
    batch_size: i32,
    max_attempts: i32,
) -> Result<u64> {
    let states = DriveSyncStore::list_enabled(pool).await?;
    let mut enqueued = 0u64;

    for state in states {
        let Some(folder) = state.folder_id else {
            continue;
        };
        ingest::enqueue_sync_job(pool, queue, &state.owner, &folder, batch_size, max_attempts)
            .await?;
        enqueued += 1;
    }

    tracing::info!(enqueued, "drive_sync_all_users tick complete");
    Ok(enqueued)
}

/// Runs `query_services::generate_daily_memories` for today's local date.
pub async fn daily_memories(pool: &PgPool) -> Result<u64> {
    let today = Local::now().date_naive();
    query_services::generate_daily_memories(pool, today).await
}

/// Drives both periodic tasks until cancelled. `batch_size`/`max_attempts`
/// are the sync job defaults drawn from `Tunables`.
pub async fn run(pool: PgPool, queue: Arc<dyn JobQueue>, batch_size: i32, max_attempts: i32) {
    let mut sync_ticker = tokio::time::interval(DRIVE_SYNC_INTERVAL);
    let mut daily_ticker = tokio::time::interval(DAILY_CHECK_INTERVAL);
    let mut last_memories_run: Option<chrono::NaiveDate> = None;

    loop {
        tokio::select! {
            _ = sync_ticker.tick() => {
                if let Err(e) = drive_sync_all_users(&pool, queue.as_ref(), batch_size, max_attempts).await {
                    tracing::error!(error = %e, "drive_sync_all_users tick failed");
                }
            }
            _ = daily_ticker.tick() => {
                if should_run_daily_memories(Local::now().naive_local().time(), Local::now().date_naive(), last_memories_run) {
                    match daily_memories(&pool).await {
                        Ok(count) => {
                            tracing::info!(count, "daily_memories tick complete");
                            last_memories_run = Some(Local::now().date_naive());
                        }
                        Err(e) => tracing::error!(error = %e, "daily_memories tick failed"),
                    }
                }
            }
        }
    }
}

fn should_run_daily_memories(
    now: NaiveTime,
    today: chrono::NaiveDate,
    last_run: Option<chrono::NaiveDate>,
) -> bool {
    if last_run == Some(today) {
        return false;
    }
    now.hour() == MEMORIES_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn runs_once_at_the_target_hour() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let at_hour = NaiveTime::from_hms_opt(8, 3, 0).unwrap();
        assert!(should_run_daily_memories(at_hour, today, None));
    }

    #[test]
    fn does_not_rerun_same_day() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let at_hour = NaiveTime::from_hms_opt(8, 10, 0).unwrap();
        assert!(!should_run_daily_memories(at_hour, today, Some(today)));
    }

    #[test]
    fn skips_outside_the_target_hour() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let at_hour = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(!should_run_daily_memories(at_hour, today, None));
    }
}
