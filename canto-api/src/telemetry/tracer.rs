//! OpenTelemetry Tracer Initialization
//!
//! Sets up the tracing subscriber and, when an endpoint is configured, an
//! OTLP/HTTP span exporter compatible with Jaeger, Grafana Tempo or any
//! other OTLP backend.

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces (e.g., "http://localhost:4318/v1/traces")
    pub otlp_endpoint: Option<String>,
    /// Service name for traces
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Trace sampling ratio (0.0 to 1.0)
    pub trace_sample_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: std::env::var("CANTO_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            service_name: std::env::var("CANTO_SERVICE_NAME")
                .unwrap_or_else(|_| "canto-api".to_string()),
            service_version: std::env::var("CANTO_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: std::env::var("CANTO_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            trace_sample_rate: std::env::var("CANTO_TRACE_SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
        }
    }
}

impl TelemetryConfig {
    fn sampler(&self) -> Sampler {
        if self.trace_sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.trace_sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.trace_sample_rate)
        }
    }
}

/// Initialize the OpenTelemetry tracer and tracing subscriber.
///
/// Call once at startup before any tracing occurs. Installs:
/// - W3C TraceContext propagation (traceparent header)
/// - OTLP exporter for distributed traces (if endpoint configured)
/// - tracing-subscriber with JSON output and the OpenTelemetry layer
///
/// The returned provider must be passed to [`shutdown_tracer`] on exit.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<SdkTracerProvider> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build();

    let mut builder = SdkTracerProvider::builder()
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to create OTLP exporter: {}", e))
            })?;
        builder = builder.with_batch_exporter(exporter);
    }

    let tracer_provider = builder.build();
    let tracer = tracer_provider.tracer("canto-api");
    global::set_tracer_provider(tracer_provider.clone());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("canto_api=debug,canto_storage=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        sample_rate = config.trace_sample_rate,
        "Telemetry initialized"
    );

    Ok(tracer_provider)
}

/// Flush pending spans and shut the tracer provider down.
pub fn shutdown_tracer(provider: &SdkTracerProvider) {
    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = %e, "Tracer shutdown reported an error");
    }
    tracing::info!("Tracer shutdown complete");
}
