//! Raw upload storage.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Could not presign URL: {0}")]
    Presign(String),
}

/// Object key for an upload: `cvs/<owner>/<job>/<file>`. The file name is
/// reduced to its last path segment and to `[A-Za-z0-9._-]`.
pub fn blob_key(owner_id: &str, job_id: Uuid, filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        safe
    };
    format!("cvs/{owner_id}/{job_id}/{safe}")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Time-limited GET URL for `key`.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}

/// S3 / MinIO backed store.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("S3 upload failed: {}", DisplayErrorContext(e))))?;

        tracing::info!(bytes = size, "Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let object = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(object) => object,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(BlobError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(BlobError::Backend(format!(
                    "S3 download failed: {}",
                    DisplayErrorContext(e)
                )))
            }
        };

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Backend(format!("S3 body read failed: {e}")))?;
        Ok(body.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("S3 delete failed: {}", DisplayErrorContext(e))))?;

        tracing::info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|e| BlobError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| BlobError::Presign(DisplayErrorContext(e).to_string()))?;
        Ok(request.uri().to_string())
    }
}
