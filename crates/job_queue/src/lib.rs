//! C4 — Job Queue: two durable FIFO channels over a Redis-compatible list.
//!
//! Delivery is at-most-once-ish: the backend guarantees FIFO ordering but
//! not exactly-once delivery, so every consumer (embedding worker, sync
//! runner dispatch) must be idempotent, per spec.md §4.4. An unconfigured
//! queue URL degrades to `NullQueue`, a no-op implementation of the same
//! trait, so uploads still succeed but embeddings lag.

use async_trait::async_trait;
use common_types::{Error, Result};
use std::time::Duration;

pub const EMBEDDING_JOBS_CHANNEL: &str = "embedding_jobs";
pub const DRIVE_SYNC_JOBS_CHANNEL: &str = "drive_sync_jobs";

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a payload to the back of `channel`.
    async fn push(&self, channel: &str, payload: &str) -> Result<()>;

    /// Prepends a payload to the front of `channel` (used to re-enqueue a
    /// job that failed transiently so it's retried ahead of newer work).
    async fn priority_push(&self, channel: &str, payload: &str) -> Result<()>;

    /// Blocks up to `timeout` waiting for an item, returning `None` on
    /// timeout rather than erroring.
    async fn pop(&self, channel: &str, timeout: Duration) -> Result<Option<String>>;

    async fn len(&self, channel: &str) -> Result<u64>;
}

pub struct RedisJobQueue {
    manager: redis::aio::ConnectionManager,
}

impl RedisJobQueue {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Internal(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("RPUSH")
            .arg(channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    async fn priority_push(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("LPUSH")
            .arg(channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    async fn pop(&self, channel: &str, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let secs = timeout.as_secs_f64().max(0.001);
        let result: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(channel)
            .arg(secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(result.map(|(_, payload)| payload))
    }

    async fn len(&self, channel: &str) -> Result<u64> {
        let mut conn = self.manager.clone();
        let len: u64 = redis::cmd("LLEN")
            .arg(channel)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(len)
    }
}

/// Degrade-to-no-op backend used when no queue URL is configured.
#[derive(Default)]
pub struct NullQueue;

#[async_trait]
impl JobQueue for NullQueue {
    async fn push(&self, channel: &str, _payload: &str) -> Result<()> {
        tracing::warn!(channel, "job queue unconfigured; push is a no-op");
        Ok(())
    }

    async fn priority_push(&self, channel: &str, _payload: &str) -> Result<()> {
        tracing::warn!(channel, "job queue unconfigured; priority_push is a no-op");
        Ok(())
    }

    async fn pop(&self, _channel: &str, timeout: Duration) -> Result<Option<String>> {
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn len(&self, _channel: &str) -> Result<u64> {
        Ok(0)
    }
}

pub async fn connect(queue_url: Option<&str>) -> Result<Box<dyn JobQueue>> {
    match queue_url {
        Some(url) => Ok(Box::new(RedisJobQueue::connect(url).await?)),
        None => Ok(Box::new(NullQueue)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_queue_pop_times_out_with_none() {
        let q = NullQueue;
        let start = std::time::Instant::now();
        let result = q.pop("embedding_jobs", Duration::from_millis(10)).await.unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn null_queue_push_always_succeeds() {
        let q = NullQueue;
        assert!(q.push("embedding_jobs", "abc").await.is_ok());
        assert_eq!(q.len("embedding_jobs").await.unwrap(), 0);
    }
}
