//! Tasks binary: C13 Scheduler entrypoint. Drives the two periodic jobs
//! — `drive_sync_all_users` every 30 minutes and `daily_memories` at
//! 08:00 local — for the lifetime of the process, mirroring the
//! teacher's `apps/tasks` binary that hosts periodic dispatch separately
//! from the job-queue consumer worker.

use color_eyre::Result;
use common_types::load_app_settings;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    color_eyre::install()?;

    let settings = load_app_settings()?;
    let pool = photo_repository::connect_pool(&settings.secrets.database_url, 5).await?;
    photo_repository::run_migrations(&pool).await?;

    let queue: Arc<dyn job_queue::JobQueue> =
        Arc::from(job_queue::connect(settings.secrets.queue_url.as_deref()).await?);

    tracing::info!("scheduler starting: drive_sync_all_users (30m) + daily_memories (08:00 local)");

    scheduler::run(
        pool,
        queue,
        i32::try_from(settings.tunables.effective_batch_size()).unwrap_or(50),
        i32::try_from(settings.tunables.max_attempts).unwrap_or(5),
    )
    .await;

    Ok(())
}
