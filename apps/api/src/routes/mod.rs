pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::cv::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/cv/upload", post(handlers::handle_upload))
        .route("/api/v1/cv/status/:id", get(handlers::handle_status))
        .route("/api/v1/cv/results/:id", get(handlers::handle_results))
        .route("/api/v1/cv/:id/cancel", post(handlers::handle_cancel))
        .route("/api/v1/cv/:id", delete(handlers::handle_delete))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
