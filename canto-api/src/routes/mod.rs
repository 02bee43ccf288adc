//! REST API Routes Module
//!
//! Includes:
//! - Word histogram routes under /api/v1/keyvalue
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics at /metrics
//! - OpenAPI document at /openapi.json (with the `openapi` feature)

pub mod health;
pub mod keyvalue;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use keyvalue::create_router as keyvalue_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;

    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. Set request id - assigns `x-request-id` when the caller sent none
/// 2. Propagate request id - echoes it on the response
/// 3. Observability - tracing span, request context and metrics
pub fn create_api_router(state: AppState) -> Router {
    let router = Router::new()
        .nest("/api/v1/keyvalue", keyvalue::create_router(state.clone()))
        .nest("/health", health::create_router(state))
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", get(openapi_json));

    router
        .layer(from_fn(observability_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
