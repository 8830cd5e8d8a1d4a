mod detect;
mod health;
mod metrics;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/detect_single_file", post(detect::detect_single_file))
        .route("/detect_multiple_files", post(detect::detect_multiple_files))
        .route("/detect_batch_folder", post(detect::detect_batch_folder))
}
