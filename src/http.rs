//! Metrics snapshot endpoint

use crate::shutdown::Shutdown;
use crate::stages::MetricsAggregator;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::{error, info};

pub fn router(aggregator: Arc<MetricsAggregator>) -> Router {
    Router::new()
        .route("/materialized", get(materialized))
        .with_state(aggregator)
}

async fn materialized(State(aggregator): State<Arc<MetricsAggregator>>) -> Response {
    let snapshot = aggregator.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => {
            error!(%err, "failed to encode metrics snapshot");
            (StatusCode::BAD_REQUEST, "metrics error").into_response()
        }
    }
}

/// Serve the snapshot endpoint until the shutdown signal fires.
pub async fn serve(
    listen_addr: &str,
    aggregator: Arc<MetricsAggregator>,
    mut shutdown: Shutdown,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(%listen_addr, "metrics endpoint listening");

    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;

    Ok(())
}
