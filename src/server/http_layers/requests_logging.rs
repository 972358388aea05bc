//! Request logging middleware.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
}

/// Installed via `axum::middleware::from_fn_with_state(level, log_requests)`
/// so the configured level travels with the layer rather than being read
/// from request state.
pub async fn log_requests(
    State(level): State<RequestsLoggingLevel>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if level == RequestsLoggingLevel::None {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let headers = if level == RequestsLoggingLevel::Headers {
        Some(request.headers().clone())
    } else {
        None
    };

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    if let Some(headers) = headers {
        info!(%method, %path, status = %response.status(), ?headers, elapsed_ms = elapsed.as_millis(), "request");
    } else {
        info!(%method, %path, status = %response.status(), elapsed_ms = elapsed.as_millis(), "request");
    }

    response
}
