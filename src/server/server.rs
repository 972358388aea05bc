use super::state::ServerState;
use super::{http_layers, staging_routes};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds and serves the Review API until `cancellation` fires.
pub async fn run_server(state: ServerState, cancellation: CancellationToken) -> anyhow::Result<()> {
    let logging_level = state.config.requests_logging_level;
    let port = state.config.port;

    let app = Router::new()
        .merge(staging_routes::routes())
        .layer(middleware::from_fn_with_state(logging_level, http_layers::log_requests))
        .with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "review api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation.cancelled().await;
            info!("review api shutting down");
        })
        .await?;

    Ok(())
}
