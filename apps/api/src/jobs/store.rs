use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CvAnalysisResult, JobStatus, UploadJob};

/// Job persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {id} is {actual}, expected {expected}")]
    StatusMismatch {
        id: Uuid,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Corrupt job record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable job records and their analysis results.
///
/// Status changes are compare-and-set: `transition` and `complete` only
/// succeed when the stored status still equals the expected one.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &UploadJob) -> Result<(), JobStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadJob>, JobStoreError>;

    /// Moves `id` from `from` to `to`, recording `error` (cleared otherwise).
    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<UploadJob, JobStoreError>;

    /// Sets the cancellation flag on a non-terminal job. Terminal jobs are
    /// returned unchanged.
    async fn request_cancel(&self, id: Uuid) -> Result<UploadJob, JobStoreError>;

    /// Stores `result` and moves its job from `processing` to `completed`
    /// in one step.
    async fn complete(&self, result: &CvAnalysisResult) -> Result<UploadJob, JobStoreError>;

    async fn get_result(&self, id: Uuid) -> Result<Option<CvAnalysisResult>, JobStoreError>;

    /// Removes the job and its result.
    async fn delete(&self, id: Uuid) -> Result<(), JobStoreError>;
}

fn check_transition(id: Uuid, from: JobStatus, to: JobStatus) -> Result<(), JobStoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(JobStoreError::InvalidTransition { id, from, to })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct UploadJobRow {
    id: Uuid,
    owner_id: String,
    filename: String,
    content_type: String,
    size_bytes: i64,
    status: String,
    error: Option<String>,
    blob_key: String,
    cancel_requested: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UploadJobRow> for UploadJob {
    type Error = JobStoreError;

    fn try_from(row: UploadJobRow) -> Result<Self, Self::Error> {
        Ok(UploadJob {
            status: row.status.parse().map_err(JobStoreError::Corrupt)?,
            id: row.id,
            owner_id: row.owner_id,
            filename: row.filename,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            error: row.error,
            blob_key: row.blob_key,
            cancel_requested: row.cancel_requested,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, owner_id, filename, content_type, size_bytes, status, error, \
                           blob_key, cancel_requested, created_at, updated_at";

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a conditional update matched no row.
    async fn mismatch(&self, id: Uuid, expected: JobStatus) -> JobStoreError {
        match self.get(id).await {
            Ok(Some(job)) => JobStoreError::StatusMismatch {
                id,
                expected,
                actual: job.status,
            },
            Ok(None) => JobStoreError::NotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &UploadJob) -> Result<(), JobStoreError> {
        sqlx::query(
            r#"
            INSERT INTO cv_upload_jobs
                (id, owner_id, filename, content_type, size_bytes, status, error,
                 blob_key, cancel_requested, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(job.id)
        .bind(&job.owner_id)
        .bind(&job.filename)
        .bind(&job.content_type)
        .bind(job.size_bytes)
        .bind(job.status.as_str())
        .bind(&job.error)
        .bind(&job.blob_key)
        .bind(job.cancel_requested)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(job_id = %job.id, "Job record created");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadJob>, JobStoreError> {
        let row: Option<UploadJobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM cv_upload_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadJob::try_from).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<UploadJob, JobStoreError> {
        check_transition(id, from, to)?;

        let row: Option<UploadJobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE cv_upload_jobs
            SET status = $3, error = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => UploadJob::try_from(row),
            None => Err(self.mismatch(id, from).await),
        }
    }

    async fn request_cancel(&self, id: Uuid) -> Result<UploadJob, JobStoreError> {
        let row: Option<UploadJobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE cv_upload_jobs
            SET cancel_requested = TRUE, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => UploadJob::try_from(row),
            None => self.get(id).await?.ok_or(JobStoreError::NotFound(id)),
        }
    }

    async fn complete(&self, result: &CvAnalysisResult) -> Result<UploadJob, JobStoreError> {
        let id = result.job_id;
        let mut tx = self.pool.begin().await?;

        let row: Option<UploadJobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE cv_upload_jobs
            SET status = 'completed', error = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(self.mismatch(id, JobStatus::Processing).await);
        };

        sqlx::query(
            r#"
            INSERT INTO cv_analyses (job_id, owner_id, result, completed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id)
            DO UPDATE SET result = EXCLUDED.result, completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(id)
        .bind(&result.owner_id)
        .bind(Json(result))
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        UploadJob::try_from(row)
    }

    async fn get_result(&self, id: Uuid) -> Result<Option<CvAnalysisResult>, JobStoreError> {
        let result: Option<Json<CvAnalysisResult>> =
            sqlx::query_scalar("SELECT result FROM cv_analyses WHERE job_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(result.map(|Json(result)| result))
    }

    async fn delete(&self, id: Uuid) -> Result<(), JobStoreError> {
        // cv_analyses rows go with the job (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM cv_upload_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        tracing::info!(job_id = %id, "Job deleted");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Tables {
        jobs: HashMap<Uuid, UploadJob>,
        results: HashMap<Uuid, CvAnalysisResult>,
    }

    /// An operation the store refuses with a database error.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(crate) enum Outage {
        Create,
        Transition(JobStatus, JobStatus),
    }

    /// Same compare-and-set semantics as [`PgJobStore`], behind one lock.
    #[derive(Default)]
    pub(crate) struct InMemoryJobStore {
        tables: Mutex<Tables>,
        outage: Option<Outage>,
    }

    impl InMemoryJobStore {
        pub(crate) fn with_outage(outage: Outage) -> Self {
            Self {
                outage: Some(outage),
                ..Self::default()
            }
        }

        pub(crate) async fn len(&self) -> usize {
            self.tables.lock().await.jobs.len()
        }

        pub(crate) async fn all(&self) -> Vec<UploadJob> {
            self.tables.lock().await.jobs.values().cloned().collect()
        }

        fn check_outage(&self, op: Outage) -> Result<(), JobStoreError> {
            if self.outage == Some(op) {
                return Err(JobStoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn create(&self, job: &UploadJob) -> Result<(), JobStoreError> {
            self.check_outage(Outage::Create)?;
            self.tables.lock().await.jobs.insert(job.id, job.clone());
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<UploadJob>, JobStoreError> {
            Ok(self.tables.lock().await.jobs.get(&id).cloned())
        }

        async fn transition(
            &self,
            id: Uuid,
            from: JobStatus,
            to: JobStatus,
            error: Option<&str>,
        ) -> Result<UploadJob, JobStoreError> {
            check_transition(id, from, to)?;
            self.check_outage(Outage::Transition(from, to))?;
            let mut tables = self.tables.lock().await;
            let job = tables.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
            if job.status != from {
                return Err(JobStoreError::StatusMismatch {
                    id,
                    expected: from,
                    actual: job.status,
                });
            }
            job.status = to;
            job.error = error.map(str::to_string);
            job.updated_at = Utc::now();
            Ok(job.clone())
        }

        async fn request_cancel(&self, id: Uuid) -> Result<UploadJob, JobStoreError> {
            let mut tables = self.tables.lock().await;
            let job = tables.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
            if !job.status.is_terminal() {
                job.cancel_requested = true;
                job.updated_at = Utc::now();
            }
            Ok(job.clone())
        }

        async fn complete(&self, result: &CvAnalysisResult) -> Result<UploadJob, JobStoreError> {
            let id = result.job_id;
            let mut tables = self.tables.lock().await;
            let job = tables.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
            if job.status != JobStatus::Processing {
                return Err(JobStoreError::StatusMismatch {
                    id,
                    expected: JobStatus::Processing,
                    actual: job.status,
                });
            }
            job.status = JobStatus::Completed;
            job.error = None;
            job.updated_at = Utc::now();
            let job = job.clone();
            tables.results.insert(id, result.clone());
            Ok(job)
        }

        async fn get_result(&self, id: Uuid) -> Result<Option<CvAnalysisResult>, JobStoreError> {
            Ok(self.tables.lock().await.results.get(&id).cloned())
        }

        async fn delete(&self, id: Uuid) -> Result<(), JobStoreError> {
            let mut tables = self.tables.lock().await;
            tables.results.remove(&id);
            tables
                .jobs
                .remove(&id)
                .map(|_| ())
                .ok_or(JobStoreError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryJobStore;
    use super::*;

    #[tokio::test]
    async fn test_compare_and_set_transitions() {
        let store = InMemoryJobStore::default();
        let job = UploadJob::new("owner", "cv.txt", "text/plain", 10);
        store.create(&job).await.unwrap();

        let processing = store
            .transition(job.id, JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap();
        assert_eq!(processing.status, JobStatus::Processing);

        // second writer with a stale view loses
        let err = store
            .transition(job.id, JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobStoreError::StatusMismatch { actual: JobStatus::Processing, .. }
        ));

        let failed = store
            .transition(job.id, JobStatus::Processing, JobStatus::Failed, Some("boom"))
            .await
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_before_touching_store() {
        let store = InMemoryJobStore::default();
        let err = store
            .transition(Uuid::new_v4(), JobStatus::Completed, JobStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_ignored_on_terminal_jobs() {
        let store = InMemoryJobStore::default();
        let job = UploadJob::new("owner", "cv.txt", "text/plain", 10);
        store.create(&job).await.unwrap();
        assert!(store.request_cancel(job.id).await.unwrap().cancel_requested);

        let other = UploadJob::new("owner", "cv2.txt", "text/plain", 10);
        store.create(&other).await.unwrap();
        store
            .transition(other.id, JobStatus::Pending, JobStatus::Failed, Some("queue down"))
            .await
            .unwrap();
        assert!(!store.request_cancel(other.id).await.unwrap().cancel_requested);

        assert!(matches!(
            store.request_cancel(Uuid::new_v4()).await,
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_job() {
        let store = InMemoryJobStore::default();
        let id = Uuid::new_v4();
        assert!(matches!(store.delete(id).await, Err(JobStoreError::NotFound(i)) if i == id));
    }
}
