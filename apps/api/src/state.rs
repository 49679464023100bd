use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::jobs::queue::JobQueue;
use crate::jobs::store::JobStore;
use crate::storage::BlobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub config: Config,
}
