//! Prometheus metrics infrastructure with singleton-based initialization.
//!
//! The recorder is installed once per process. The `/metrics` and `/health`
//! routes are exposed as an axum [`Router`] so the invocation server can
//! mount them next to its own endpoints.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::sync::OnceLock;
use tracing::info;

use crate::error::{AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu, PrometheusInitSnafu};

/// Histogram buckets for duration metrics (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Global metrics controller singleton.
static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();

/// Controller for the process-wide Prometheus recorder.
pub struct MetricsController {
    handle: PrometheusHandle,
}

/// Install the Prometheus recorder for production use.
///
/// # Errors
///
/// Returns an error if:
/// - The recorder is already initialized
/// - The Prometheus recorder fails to initialize
pub fn init_global() -> Result<(), MetricsError> {
    install()?;
    info!("Metrics recorder installed");
    Ok(())
}

/// Initialize the metrics subsystem for tests.
///
/// Safe to call from many test threads: a thread that loses the race spins
/// until the winner has published the controller.
pub fn init_test() {
    if install().is_err() {
        while CONTROLLER.get().is_none() {
            std::hint::spin_loop();
        }
    }
}

fn install() -> Result<(), MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController { handle })
        .map_err(|_| AlreadyInitializedSnafu.build())
}

impl MetricsController {
    /// Get a reference to the global metrics controller.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics have not been initialized.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Routes for `/metrics` and `/health`.
///
/// # Errors
///
/// Returns an error if the recorder has not been installed.
pub fn router() -> Result<Router, MetricsError> {
    let controller = MetricsController::get()?;

    Ok(Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(controller.handle.clone())))
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
