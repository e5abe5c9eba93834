//! HTTP surface: one route per configured endpoint.

pub mod validate;
pub mod webhook;

use axum::{Router, http::StatusCode, routing};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::HooksConfig;
use crate::queue::JobSender;

pub use webhook::{Dispatcher, handle_webhook};

/// Upper bound on reading and answering one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the router, mounting a dispatcher on every configured path.
pub fn build_router(config: HooksConfig, jobs: JobSender) -> Router {
    let mut router = Router::new();
    for (path, endpoint) in config {
        info!(
            path = %path,
            repo = %endpoint.repo_name,
            signed = endpoint.secret_bytes().is_some(),
            "Registering endpoint"
        );
        let dispatcher = Arc::new(Dispatcher::new(path.clone(), endpoint, jobs.clone()));
        router = router.route(&path, routing::any(handle_webhook).with_state(dispatcher));
    }
    router
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found\n") })
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
