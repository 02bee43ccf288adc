//! OpenAPI Specification for the Canto API
//!
//! Generated with utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use canto_core::Histogram;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{
    self, CacheHealth, ComponentHealth, HealthDetails, HealthResponse, HealthStatus,
};
use crate::routes::keyvalue::{self, SetWordsRequest};
use crate::telemetry::metrics;

/// OpenAPI document for the Canto API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Canto API",
        description = "Read-through word-count cache over the verse document store",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3230", description = "Local Development")
    ),
    tags(
        (name = "Histograms", description = "Per-verse word histograms"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        keyvalue::get_histogram,
        keyvalue::set_words,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        Histogram,
        SetWordsRequest,
        ApiError,
        ErrorCode,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
        CacheHealth,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_histogram_paths() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/v1/keyvalue/{book}/{canto}/{verse}"));
        assert!(json.contains("/health/ready"));
        assert!(json.contains("SetWordsRequest"));
    }

    #[test]
    fn test_document_version_tracks_crate() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }
}
