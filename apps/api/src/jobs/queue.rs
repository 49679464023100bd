//! Durable job queue.
//!
//! Redis reliable-queue layout: producers `LPUSH` onto [`PENDING_KEY`], the
//! consumer atomically `BLMOVE`s each entry onto [`PROCESSING_KEY`] and
//! `LREM`s it from there once the job reached a terminal state. Entries
//! left in the processing list by a crash are moved back on startup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::extraction::FileKind;

pub const PENDING_KEY: &str = "cv:jobs:pending";
pub const PROCESSING_KEY: &str = "cv:jobs:processing";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to serialize job payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Payload carried through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub owner_id: String,
    pub blob_key: String,
    pub kind: FileKind,
    pub enqueued_at: DateTime<Utc>,
}

/// A dequeued job. `raw` is the exact queue entry, needed to ack it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: QueuedJob,
    raw: String,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError>;

    /// Waits up to `wait` for the next job.
    async fn dequeue(&self, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Drops a delivered job for good.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Re-queues deliveries that were never acknowledged. Returns how many.
    async fn recover(&self) -> Result<usize, QueueError>;
}

/// Decodes a queue entry. Entries that are not valid payloads are returned
/// as `Err(raw)` so the caller can discard them.
fn decode(raw: String) -> Result<Delivery, String> {
    match serde_json::from_str::<QueuedJob>(&raw) {
        Ok(job) => Ok(Delivery { job, raw }),
        Err(e) => {
            tracing::error!(error = %e, "Discarding undecodable queue entry");
            Err(raw)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    /// Dedicated connection for `BLMOVE`, which would stall every other
    /// command multiplexed behind it.
    blocking: Mutex<MultiplexedConnection>,
}

impl RedisJobQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, QueueError> {
        let conn = client.get_multiplexed_async_connection().await?;
        let blocking = client.get_multiplexed_async_connection().await?;
        tracing::info!("Redis job queue connected");
        Ok(Self {
            conn,
            blocking: Mutex::new(blocking),
        })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let depth: i64 = redis::cmd("LPUSH")
            .arg(PENDING_KEY)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        tracing::info!(job_id = %job.job_id, queue_depth = depth, "Job enqueued");
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let raw: Option<String> = {
            let mut conn = self.blocking.lock().await;
            redis::cmd("BLMOVE")
                .arg(PENDING_KEY)
                .arg(PROCESSING_KEY)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(wait.as_secs_f64())
                .query_async(&mut *conn)
                .await?
        };

        let Some(raw) = raw else {
            return Ok(None);
        };

        match decode(raw) {
            Ok(delivery) => Ok(Some(delivery)),
            Err(raw) => {
                let mut conn = self.conn.clone();
                let _: i64 = redis::cmd("LREM")
                    .arg(PROCESSING_KEY)
                    .arg(1)
                    .arg(raw)
                    .query_async(&mut conn)
                    .await?;
                Ok(None)
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("LREM")
            .arg(PROCESSING_KEY)
            .arg(1)
            .arg(&delivery.raw)
            .query_async(&mut conn)
            .await?;

        if removed == 0 {
            tracing::warn!(job_id = %delivery.job.job_id, "Acked job was not in the processing list");
        }
        Ok(())
    }

    async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        // newest first onto the consumer end, so the oldest is served first
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(PROCESSING_KEY)
                .arg(PENDING_KEY)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::warn!(count = recovered, "Re-queued unacknowledged jobs");
        }
        Ok(recovered)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────
