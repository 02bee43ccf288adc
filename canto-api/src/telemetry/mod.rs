//! Canto Telemetry - Observability Infrastructure
//!
//! Provides OpenTelemetry tracing and Prometheus metrics for the API layer.
//! Tracing works without a collector; spans are only exported when
//! `CANTO_OTLP_ENDPOINT` is set.

pub mod metrics;
pub mod middleware;
pub mod store;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, CantoMetrics, PassMetrics, METRICS};
pub use middleware::observability_middleware;
pub use store::InstrumentedStore;
pub use tracer::{init_tracer, shutdown_tracer, TelemetryConfig};
