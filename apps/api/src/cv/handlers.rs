use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::CallerId;
use crate::cv::validate_upload;
use crate::errors::AppError;
use crate::jobs::queue::QueuedJob;
use crate::jobs::{CvAnalysisResult, JobStatus, UploadJob};
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const NOT_QUEUED: &str = "could not be queued for processing";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub upload_id: Uuid,
    pub status: JobStatus,
    /// Time-limited link to the stored file.
    pub file_url: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub upload_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl From<&UploadJob> for StatusResponse {
    fn from(job: &UploadJob) -> Self {
        Self {
            upload_id: job.id,
            status: job.status,
            error: job.error.clone(),
            result_url: (job.status == JobStatus::Completed)
                .then(|| format!("/api/v1/cv/results/{}", job.id)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub upload_id: Uuid,
    pub status: JobStatus,
    pub cancel_requested: bool,
}

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::InvalidInput("upload exceeds the size limit".to_string())
    } else {
        AppError::InvalidInput(format!("malformed multipart body: {}", e.body_text()))
    }
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(UploadedFile {
            filename,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

/// Loads a job the caller owns. Other owners' jobs look missing.
async fn owned_job(state: &AppState, id: Uuid, caller: &CallerId) -> Result<UploadJob, AppError> {
    match state.jobs.get(id).await? {
        Some(job) if job.owner_id == caller.0 => Ok(job),
        _ => Err(AppError::NotFound(format!("Upload {id} not found"))),
    }
}

/// Fails a job that never reached the queue.
async fn abandon_job(state: &AppState, id: Uuid, from: JobStatus) {
    if let Err(e) = state
        .jobs
        .transition(id, from, JobStatus::Failed, Some(NOT_QUEUED))
        .await
    {
        error!(job_id = %id, error = %e, "Failed to record enqueue failure");
    }
}

/// POST /api/v1/cv/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    caller: CallerId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let upload = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::InvalidInput(format!("multipart field '{FILE_FIELD}' is required")))?;
    let kind = validate_upload(&upload.filename, upload.bytes.len(), state.config.max_upload_bytes)?;

    let job = UploadJob::new(
        caller.0,
        upload.filename,
        upload.content_type,
        upload.bytes.len(),
    );
    state
        .blobs
        .put(&job.blob_key, upload.bytes, &job.content_type)
        .await?;
    if let Err(e) = state.jobs.create(&job).await {
        if let Err(blob_err) = state.blobs.delete(&job.blob_key).await {
            warn!(key = %job.blob_key, error = %blob_err, "Failed to remove orphaned upload");
        }
        return Err(e.into());
    }
    let job = match state
        .jobs
        .transition(job.id, JobStatus::Pending, JobStatus::Processing, None)
        .await
    {
        Ok(job) => job,
        Err(e) => {
            abandon_job(&state, job.id, JobStatus::Pending).await;
            return Err(e.into());
        }
    };

    let queued = QueuedJob {
        job_id: job.id,
        owner_id: job.owner_id.clone(),
        blob_key: job.blob_key.clone(),
        kind,
        enqueued_at: Utc::now(),
    };
    if let Err(e) = state.queue.enqueue(&queued).await {
        abandon_job(&state, job.id, JobStatus::Processing).await;
        return Err(e.into());
    }

    let file_url = match state
        .blobs
        .presigned_url(&job.blob_key, state.config.presigned_url_ttl())
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Could not presign upload URL");
            None
        }
    };

    info!(
        job_id = %job.id,
        kind = kind.extension(),
        bytes = job.size_bytes,
        "CV accepted for processing"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            upload_id: job.id,
            status: job.status,
            file_url,
            message: "CV uploaded; analysis is running in the background".to_string(),
        }),
    ))
}

/// GET /api/v1/cv/status/:id
pub async fn handle_status(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    let job = owned_job(&state, id, &caller).await?;
    Ok(Json(StatusResponse::from(&job)))
}

/// GET /api/v1/cv/results/:id
pub async fn handle_results(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<CvAnalysisResult>, AppError> {
    let job = owned_job(&state, id, &caller).await?;
    match job.status {
        JobStatus::Completed => {}
        JobStatus::Failed => {
            return Err(AppError::Conflict(format!(
                "Analysis failed: {}",
                job.error.as_deref().unwrap_or("unknown error")
            )))
        }
        JobStatus::Pending | JobStatus::Processing => {
            return Err(AppError::NotFound(format!(
                "Analysis for upload {id} is not ready yet"
            )))
        }
    }

    let result = state
        .jobs
        .get_result(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis for upload {id} not found")))?;
    Ok(Json(result))
}

/// POST /api/v1/cv/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CancelResponse>), AppError> {
    let job = owned_job(&state, id, &caller).await?;
    if job.status.is_terminal() {
        return Err(AppError::Conflict(format!("Upload {id} is already {}", job.status)));
    }

    let job = state.jobs.request_cancel(id).await?;
    info!(job_id = %id, "Cancellation requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            upload_id: job.id,
            status: job.status,
            cancel_requested: job.cancel_requested,
        }),
    ))
}

/// DELETE /api/v1/cv/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let job = owned_job(&state, id, &caller).await?;
    if !job.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Upload {id} is still {}; cancel it and wait for it to finish first",
            job.status
        )));
    }

    state.blobs.delete(&job.blob_key).await?;
    state.jobs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::memory::StaticVerifier;
    use crate::config::tests::test_config;
    use crate::jobs::pipeline::tests::{pipeline, CV_TEXT};
    use crate::jobs::queue::memory::InMemoryJobQueue;
    use crate::jobs::queue::JobQueue;
    use crate::jobs::store::memory::{InMemoryJobStore, Outage};
    use crate::jobs::store::JobStore;
    use crate::routes::build_router;
    use crate::storage::memory::InMemoryBlobStore;

    use super::*;

    const BOUNDARY: &str = "cv-test-boundary";
    const ALICE: &str = "Bearer alice-token";
    const BOB: &str = "Bearer bob-token";

    struct TestApp {
        router: Router,
        jobs: Arc<InMemoryJobStore>,
        queue: Arc<InMemoryJobQueue>,
        blobs: Arc<InMemoryBlobStore>,
    }

    fn app() -> TestApp {
        app_with(InMemoryJobStore::default())
    }

    fn app_with(jobs: InMemoryJobStore) -> TestApp {
        let jobs = Arc::new(jobs);
        let queue = Arc::new(InMemoryJobQueue::default());
        let blobs = Arc::new(InMemoryBlobStore::default());
        let state = AppState {
            jobs: jobs.clone(),
            queue: queue.clone(),
            blobs: blobs.clone(),
            identity: Arc::new(
                StaticVerifier::default()
                    .with("alice-token", "alice")
                    .with("bob-token", "bob"),
            ),
            config: test_config(),
        };
        TestApp {
            router: build_router(state),
            jobs,
            queue,
            blobs,
        }
    }

    fn multipart_body(filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(auth: Option<&str>, filename: &str, content: &[u8]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/cv/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder
            .body(Body::from(multipart_body(filename, content)))
            .unwrap()
    }

    fn request(method: &str, uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn upload(app: &TestApp, content: &[u8]) -> Uuid {
        let (status, body) = send(app, upload_request(Some(ALICE), "cv.txt", content)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        body["upload_id"].as_str().unwrap().parse().unwrap()
    }

    /// Runs the dequeued job the way a worker would.
    async fn run_next_job(app: &TestApp) {
        let delivery = app
            .queue
            .dequeue(std::time::Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        let job = app.jobs.get(delivery.job.job_id).await.unwrap().unwrap();
        match pipeline(app.blobs.clone(), app.jobs.clone()).process(&job).await {
            Ok(result) => {
                app.jobs.complete(&result).await.unwrap();
            }
            Err(e) => {
                app.jobs
                    .transition(job.id, JobStatus::Processing, JobStatus::Failed, Some(e.detail().as_str()))
                    .await
                    .unwrap();
            }
        }
        app.queue.ack(&delivery).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_accepts_and_enqueues() {
        let app = app();
        let (status, body) = send(&app, upload_request(Some(ALICE), "cv.txt", CV_TEXT.as_bytes())).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "processing");
        assert!(body["file_url"].as_str().unwrap().starts_with("memory://cvs/alice/"));
        assert!(body["message"].is_string());

        let id: Uuid = body["upload_id"].as_str().unwrap().parse().unwrap();
        let job = app.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.owner_id, "alice");
        assert_eq!(job.filename, "cv.txt");
        assert!(app.blobs.contains(&job.blob_key).await);
        assert_eq!(app.queue.pending_len().await, 1);
    }

    #[tokio::test]
    async fn test_unstartable_job_is_marked_failed() {
        let app = app_with(InMemoryJobStore::with_outage(Outage::Transition(
            JobStatus::Pending,
            JobStatus::Processing,
        )));
        let (status, body) = send(&app, upload_request(Some(ALICE), "cv.txt", CV_TEXT.as_bytes())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "STORE_ERROR");
        let jobs = app.jobs.all().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(jobs[0].error.as_deref(), Some(NOT_QUEUED));
        assert_eq!(app.queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_unrecorded_upload_removes_blob() {
        let app = app_with(InMemoryJobStore::with_outage(Outage::Create));
        let (status, _) = send(&app, upload_request(Some(ALICE), "cv.txt", CV_TEXT.as_bytes())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.jobs.len().await, 0);
        assert_eq!(app.blobs.len().await, 0);
        assert_eq!(app.queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_executable_rejected_without_creating_job() {
        let app = app();
        let (status, body) = send(&app, upload_request(Some(ALICE), "setup.exe", b"MZ\x90\x00")).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
        assert_eq!(app.jobs.len().await, 0);
        assert_eq!(app.queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_and_empty_uploads_rejected() {
        let app = app();
        let big = vec![b'a'; test_config().max_upload_bytes + 1];
        let (status, body) = send(&app, upload_request(Some(ALICE), "cv.txt", &big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, _) = send(&app, upload_request(Some(ALICE), "cv.txt", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.jobs.len().await, 0);
    }

    #[tokio::test]
    async fn test_requests_without_valid_token_are_unauthorized() {
        let app = app();
        let (status, body) = send(&app, upload_request(None, "cv.txt", b"hello")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let uri = format!("/api/v1/cv/status/{}", Uuid::new_v4());
        let (status, _) = send(&app, request("GET", &uri, "Bearer nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_results_lifecycle() {
        let app = app();
        let id = upload(&app, CV_TEXT.as_bytes()).await;

        let (status, body) = send(&app, request("GET", &format!("/api/v1/cv/status/{id}"), ALICE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");
        assert!(body.get("result_url").is_none());

        let results_uri = format!("/api/v1/cv/results/{id}");
        let (status, _) = send(&app, request("GET", &results_uri, ALICE)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        run_next_job(&app).await;

        let (_, body) = send(&app, request("GET", &format!("/api/v1/cv/status/{id}"), ALICE)).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result_url"], results_uri);

        let (status, body) = send(&app, request("GET", &results_uri, ALICE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_id"], id.to_string());
        let skills: Vec<&str> = body["skills"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert!(skills.contains(&"Python"));
    }

    #[tokio::test]
    async fn test_failed_job_results_conflict() {
        let app = app();
        let id = upload(&app, b"   ").await;
        run_next_job(&app).await;

        let (_, body) = send(&app, request("GET", &format!("/api/v1/cv/status/{id}"), ALICE)).await;
        assert_eq!(body["status"], "failed");
        assert!(body["error"].is_string());

        let (status, body) = send(&app, request("GET", &format!("/api/v1/cv/results/{id}"), ALICE)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_other_owners_cannot_see_upload() {
        let app = app();
        let id = upload(&app, CV_TEXT.as_bytes()).await;

        let (status, _) = send(&app, request("GET", &format!("/api/v1/cv/status/{id}"), BOB)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, request("DELETE", &format!("/api/v1/cv/{id}"), BOB)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_then_delete() {
        let app = app();
        let id = upload(&app, CV_TEXT.as_bytes()).await;

        let (status, _) = send(&app, request("DELETE", &format!("/api/v1/cv/{id}"), ALICE)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, request("POST", &format!("/api/v1/cv/{id}/cancel"), ALICE)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["cancel_requested"], true);

        run_next_job(&app).await;
        let job = app.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("cancelled"));

        let (status, _) = send(&app, request("POST", &format!("/api/v1/cv/{id}/cancel"), ALICE)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, request("DELETE", &format!("/api/v1/cv/{id}"), ALICE)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.jobs.get(id).await.unwrap().is_none());
        assert!(!app.blobs.contains(&job.blob_key).await);
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
