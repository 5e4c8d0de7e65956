//! C9 — Embedding Worker: the blocking-pop consumer of `embedding_jobs`.
//!
//! Generalizes the teacher's Postgres-polling worker loop to the
//! `JobQueue` trait: pop a photo id, fetch its bytes, embed, write the
//! vector exactly once (compare-and-set on `embedding IS NULL`), and hand
//! off to the people clusterer. A transient failure re-enqueues the job
//! and backs off for a fixed interval rather than spinning.

use clients::EmbedderClient;
use common_types::Result;
use job_queue::{EMBEDDING_JOBS_CHANNEL, JobQueue};
use object_store_adapter::ObjectStore;
use photo_repository::PhotoStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const BACKOFF_ON_FAILURE: Duration = Duration::from_secs(60);
const POP_TIMEOUT: Duration = Duration::from_secs(1);

pub struct EmbeddingWorker {
    pub pool: PgPool,
    pub object_store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub embedder: Arc<dyn EmbedderClient>,
    pub cluster_candidates: i64,
    pub cluster_threshold: f32,
}

impl EmbeddingWorker {
    /// Runs forever, blocking-popping `embedding_jobs` until the process
    /// is killed. Each iteration is a fresh idempotent attempt, so a crash
    /// mid-job just means the next worker to pop it retries from scratch.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.queue.pop(EMBEDDING_JOBS_CHANNEL, POP_TIMEOUT).await? {
                Some(photo_id) => self.process_one(&photo_id).await,
                None => continue,
            }
        }
    }

    async fn process_one(&self, photo_id: &str) {
        if let Err(e) = self.try_process(photo_id).await {
            tracing::warn!(photo_id, error = %e, "embedding job failed, re-enqueueing");
            if let Err(push_err) = self.queue.push(EMBEDDING_JOBS_CHANNEL, photo_id).await {
                tracing::error!(photo_id, error = %push_err, "failed to re-enqueue embedding job");
            }
            tokio::time::sleep(BACKOFF_ON_FAILURE).await;
        }
    }

    async fn try_process(&self, photo_id: &str) -> Result<()> {
        let Some(photo) = PhotoStore::find_by_id(&self.pool, photo_id).await? else {
            tracing::debug!(photo_id, "photo no longer exists, dropping embedding job");
            return Ok(());
        };
        if photo.is_deleted || photo.embedding.is_some() {
            tracing::debug!(photo_id, "photo already embedded or deleted, skipping");
            return Ok(());
        }

        let bytes = self.object_store.get(&photo.storage_key).await?;
        let embedding = self.embedder.embed_image(bytes).await?;

        let wrote = PhotoStore::set_embedding(&self.pool, photo_id, &embedding).await?;
        if !wrote {
            tracing::debug!(photo_id, "embedding already written by another worker");
            return Ok(());
        }

        let tag = people_clusterer::assign_cluster(
            &self.pool,
            &photo.owner,
            photo_id,
            &embedding,
            self.cluster_candidates,
            self.cluster_threshold,
        )
        .await?;
        tracing::info!(photo_id, tag, "photo embedded and clustered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_and_timeout_are_sane() {
        assert!(BACKOFF_ON_FAILURE > POP_TIMEOUT);
    }
}
