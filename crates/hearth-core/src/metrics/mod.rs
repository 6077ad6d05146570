//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder singleton and the `/metrics` routes

pub mod events;
pub mod server;

pub use server::{MetricsController, init_global, init_test, router};

/// Emit a metric event.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding Prometheus metric.
///
/// ```ignore
/// use hearth_core::metrics::events::{ObjectsLocated, RowsLoaded};
///
/// emit!(ObjectsLocated { count: 3 });
/// emit!(RowsLoaded { count: 100, table: "living_wage".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;
