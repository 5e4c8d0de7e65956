//! Worker binary: runs the two queue-consumer loops that drive ingestion
//! to completion after a photo or sync job has been enqueued — the
//! embedding worker (C9) and the sync job dispatch loop (C8) — side by
//! side in one process, mirroring the teacher's single `apps/worker`
//! binary that hosts every job-queue handler.

use clients::{HttpEmbedderClient, HttpSourceClient};
use color_eyre::Result;
use common_types::load_app_settings;
use embedding_worker::EmbeddingWorker;
use ingest::{ProgressRegistry, SyncJobRunner, run_sync_dispatch_loop};
use object_store_adapter::S3ObjectStore;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    color_eyre::install()?;

    let settings = load_app_settings()?;
    let pool = photo_repository::connect_pool(&settings.secrets.database_url, 10).await?;
    photo_repository::run_migrations(&pool).await?;

    let object_store: Arc<dyn object_store_adapter::ObjectStore> = Arc::new(
        S3ObjectStore::from_config(
            settings.secrets.object_store_endpoint.as_deref(),
            settings.secrets.object_store_bucket.clone(),
            &settings.secrets.object_store_access_key,
            &settings.secrets.object_store_secret_key,
        )
        .await,
    );
    let queue: Arc<dyn job_queue::JobQueue> =
        Arc::from(job_queue::connect(settings.secrets.queue_url.as_deref()).await?);
    let embedder: Arc<dyn clients::EmbedderClient> =
        Arc::new(HttpEmbedderClient::new(settings.secrets.embedder_url.clone()));
    let source_client: Arc<dyn clients::SourceClient> = Arc::new(HttpSourceClient::new(
        // The Drive-like source's own API base is not a listed required
        // secret in spec.md §6; reuse the OAuth token endpoint's origin
        // is out of scope (an external collaborator, §1), so this is
        // read from the same env var the teacher used for its Google
        // Drive integration.
        std::env::var("SOURCE_API_BASE").unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".into()),
        std::env::var("SOURCE_TOKEN_URL").unwrap_or_else(|_| "https://oauth2.googleapis.com/token".into()),
        settings.secrets.source_oauth_client_id.clone(),
        settings.secrets.source_oauth_client_secret.clone(),
    ));

    let embedding_worker = EmbeddingWorker {
        pool: pool.clone(),
        object_store: object_store.clone(),
        queue: queue.clone(),
        embedder,
        cluster_candidates: i64::from(settings.tunables.cluster_candidates),
        cluster_threshold: settings.tunables.cluster_threshold,
    };

    let sync_runner = Arc::new(SyncJobRunner {
        pool: pool.clone(),
        object_store,
        queue: queue.clone(),
        source_client,
        progress: Arc::new(ProgressRegistry::new()),
        batch_size: i32::try_from(settings.tunables.effective_batch_size()).unwrap_or(50),
        max_attempts: i32::try_from(settings.tunables.max_attempts).unwrap_or(5),
        drive_max_bytes: settings.tunables.drive_max_bytes,
        max_file_size_bytes: settings.tunables.max_file_size_bytes,
    });

    tracing::info!("worker starting: embedding consumer + sync job dispatcher");

    let embedding_task = tokio::spawn(async move {
        if let Err(e) = embedding_worker.run().await {
            tracing::error!(error = %e, "embedding worker loop exited");
        }
    });
    let sync_task = tokio::spawn(run_sync_dispatch_loop(sync_runner, queue));

    tokio::select! {
        res = embedding_task => {
            if let Err(e) = res {
                tracing::error!(error = %e, "embedding worker task panicked");
            }
        }
        res = sync_task => {
            if let Err(e) = res {
                tracing::error!(error = ?e, "sync dispatch task exited");
            }
        }
    }

    Ok(())
}
