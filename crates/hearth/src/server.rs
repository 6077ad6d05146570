//! HTTP trigger for `hearth serve`.
//!
//! `POST /invoke` takes the invocation payload and answers with the
//! invocation response JSON. `/metrics` and `/health` are mounted next to it.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use snafu::prelude::*;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{BindSnafu, MetricsSnafu, PipelineError, ServeSnafu};
use crate::pipeline::{InvocationResponse, LoadResult, Pipeline};

/// Status code for an invocation outcome.
///
/// 200 on success, 400 for a rejected payload, 503 when a retry may succeed,
/// 500 otherwise.
pub fn status_code(result: &LoadResult) -> StatusCode {
    match result.error_kind() {
        None => StatusCode::OK,
        Some("InvalidRequest") => StatusCode::BAD_REQUEST,
        Some(_) if result.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn invoke_handler(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> (StatusCode, Json<InvocationResponse>) {
    let result = pipeline.invoke(&body).await;
    (status_code(&result), Json(result.response()))
}

async fn health_handler() -> &'static str {
    "ok\n"
}

/// Routes for the invocation endpoint.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/invoke", post(invoke_handler))
        .with_state(pipeline)
}

/// Serve until the pipeline's shutdown token is cancelled.
///
/// With `with_metrics`, the Prometheus recorder must already be installed.
pub async fn serve(
    pipeline: Arc<Pipeline>,
    address: &str,
    with_metrics: bool,
) -> Result<(), PipelineError> {
    let shutdown = pipeline.shutdown().clone();

    let app = if with_metrics {
        router(pipeline).merge(hearth_core::metrics::router().context(MetricsSnafu)?)
    } else {
        router(pipeline).route("/health", get(health_handler))
    };

    let listener = TcpListener::bind(address)
        .await
        .context(BindSnafu { address })?;
    info!(address, metrics = with_metrics, "Listening for invocations");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context(ServeSnafu)?;

    info!("Server stopped");
    Ok(())
}
