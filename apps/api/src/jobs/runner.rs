//! Background worker pool consuming the job queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::notifier::{JobEvent, Notifier};
use super::pipeline::CvPipeline;
use super::queue::{Delivery, JobQueue};
use super::store::{JobStore, JobStoreError};
use super::{JobStatus, UploadJob, CANCELLED_DETAIL};

/// How long one dequeue call blocks before the loop polls again.
const POLL_WAIT: Duration = Duration::from_secs(5);
/// Back-off after the queue itself errored.
const QUEUE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Everything a worker needs to take a job to a terminal state.
pub struct WorkerContext {
    pub pipeline: Arc<CvPipeline>,
    pub jobs: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub notifier: Arc<dyn Notifier>,
    /// Overall deadline for one pipeline run.
    pub job_timeout: Duration,
}

/// Runs up to `max_concurrent_jobs` jobs at a time until the queue closes.
pub fn spawn_worker_pool(context: Arc<WorkerContext>, max_concurrent_jobs: usize) -> JoinHandle<()> {
    let concurrency = max_concurrent_jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    tokio::spawn(async move {
        info!("Job worker pool started with concurrency: {}", concurrency);

        loop {
            // Wait for a free slot before taking a job off the queue
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(error = %err, "Failed to acquire concurrency permit for job processing");
                    break;
                }
            };

            let delivery = match context.queue.dequeue(POLL_WAIT).await {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!("Failed to poll job queue: {}", e);
                    tokio::time::sleep(QUEUE_RETRY_DELAY).await;
                    None
                }
            };

            match delivery {
                Some(delivery) => {
                    let ctx = context.clone();
                    tokio::spawn(async move {
                        if let Err(err) = process_delivery(&ctx, delivery).await {
                            error!(error = %err, "Job left unacknowledged for recovery");
                        }
                        drop(permit);
                    });
                }
                None => drop(permit),
            }
        }

        warn!("Job worker pool exiting");
    })
}

/// Takes one delivery to a terminal job state, notifies the owner and acks
/// it. When the store cannot record the outcome the delivery stays
/// unacknowledged so a restart re-queues it.
pub async fn process_delivery(ctx: &WorkerContext, delivery: Delivery) -> Result<(), JobStoreError> {
    let job_id = delivery.job.job_id;

    if let Some(job) = run_job(ctx, job_id).await? {
        if let Err(e) = ctx.notifier.notify(&JobEvent::from(&job)).await {
            warn!(job_id = %job_id, error = %e, "Failed to publish completion event");
        }
    }

    if let Err(e) = ctx.queue.ack(&delivery).await {
        warn!(job_id = %job_id, error = %e, "Failed to ack job");
    }
    Ok(())
}

/// Returns the job in its terminal state, or `None` when there was nothing
/// left to do.
async fn run_job(ctx: &WorkerContext, job_id: Uuid) -> Result<Option<UploadJob>, JobStoreError> {
    let Some(job) = ctx.jobs.get(job_id).await? else {
        warn!(job_id = %job_id, "Dequeued job has no record, dropping");
        return Ok(None);
    };
    if job.status.is_terminal() {
        debug!(job_id = %job_id, status = %job.status, "Job already finished, skipping");
        return Ok(None);
    }
    let job = match job.status {
        JobStatus::Pending => {
            ctx.jobs
                .transition(job_id, JobStatus::Pending, JobStatus::Processing, None)
                .await?
        }
        _ => job,
    };

    info!(job_id = %job_id, filename = %job.filename, "Processing CV");

    let pipeline = ctx.pipeline.clone();
    let task_job = job.clone();
    let mut task = tokio::spawn(async move { pipeline.process(&task_job).await });

    let outcome = match tokio::time::timeout(ctx.job_timeout, &mut task).await {
        Ok(Ok(result)) => result.map_err(|e| e.detail()),
        Ok(Err(join_err)) => Err(format!("pipeline crashed: {join_err}")),
        Err(_) => {
            task.abort();
            Err(format!("timed out after {}s", ctx.job_timeout.as_secs()))
        }
    };

    let finished = match outcome {
        Ok(result) => match ctx.jobs.complete(&result).await {
            Ok(job) => {
                info!(job_id = %job_id, skills = result.skills.len(), "Job completed");
                job
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to store analysis result");
                fail(ctx, job_id, "failed to store analysis result").await?
            }
        },
        Err(detail) => fail(ctx, job_id, &detail).await?,
    };

    Ok(Some(finished))
}

async fn fail(ctx: &WorkerContext, job_id: Uuid, detail: &str) -> Result<UploadJob, JobStoreError> {
    if detail == CANCELLED_DETAIL {
        info!(job_id = %job_id, "Job cancelled");
    } else {
        error!(job_id = %job_id, error = %detail, "Job failed");
    }
    ctx.jobs
        .transition(job_id, JobStatus::Processing, JobStatus::Failed, Some(detail))
        .await
}
