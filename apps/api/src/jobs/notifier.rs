use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobStatus, UploadJob};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Redis publish failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pushed to the owner when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub upload_id: Uuid,
    pub owner_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl From<&UploadJob> for JobEvent {
    fn from(job: &UploadJob) -> Self {
        Self {
            upload_id: job.id,
            owner_id: job.owner_id.clone(),
            status: job.status,
            error: job.error.clone(),
            occurred_at: job.updated_at,
        }
    }
}

pub fn channel_for(owner_id: &str) -> String {
    format!("cv:events:{owner_id}")
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &JobEvent) -> Result<(), NotifyError>;
}

/// Publishes events on the owner's Redis channel.
pub struct RedisNotifier {
    conn: MultiplexedConnection,
}

impl RedisNotifier {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn notify(&self, event: &JobEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel_for(&event.owner_id))
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(upload_id = %event.upload_id, receivers, "Completion event published");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) events: Mutex<Vec<JobEvent>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &JobEvent) -> Result<(), NotifyError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }
}
