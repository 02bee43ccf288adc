//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - A tracing span parented to the caller's W3C trace context
//! - Prometheus metrics collection, labelled by matched route
//! - Status code and body size of every response, on the span and in metrics
//! - The start of every JSON response body, on the span
//! - A [`RequestContext`] in request extensions, carrying the request id and
//!   the trace headers to forward on upstream calls

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{MatchedPath, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use canto_core::{RequestContext, REQUEST_ID_HEADER};
use opentelemetry::{global, Context};
use opentelemetry_http::HeaderExtractor;
use tracing::{field::Empty, info_span, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::metrics::metrics;

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Bytes of a JSON body recorded on the span.
const RECORDED_BODY_BYTES: usize = 512;

/// JSON bodies larger than this are passed through without being recorded.
const MAX_BUFFERED_BODY: usize = 64 * 1024;

/// Extract trace context from incoming request headers.
fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Write the span's trace context into `ctx` as propagation headers.
fn inject_trace_context(span: &Span, ctx: &mut RequestContext) {
    let cx = span.context();
    let mut carrier: HashMap<String, String> = HashMap::new();
    global::get_text_map_propagator(|propagator| propagator.inject_context(&cx, &mut carrier));
    for (name, value) in carrier {
        ctx.insert_header(name, value);
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Leading `RECORDED_BODY_BYTES` of `bytes`, lossily decoded.
fn body_preview(bytes: &[u8]) -> String {
    if bytes.len() <= RECORDED_BODY_BYTES {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    format!("{}...", String::from_utf8_lossy(&bytes[..RECORDED_BODY_BYTES]))
}

/// Buffer a small JSON body so its start can be recorded, then rebuild the
/// response around the same bytes.
async fn capture_json_body(response: Response, size: Option<u64>) -> (Response, Option<String>) {
    let small = size.is_some_and(|bytes| bytes as usize <= MAX_BUFFERED_BODY);
    if !small || !is_json(response.headers()) {
        return (response, None);
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => {
            let preview = body_preview(&bytes);
            (Response::from_parts(parts, Body::from(bytes)), Some(preview))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer response body");
            (Response::from_parts(parts, Body::from(Bytes::new())), None)
        }
    }
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(RequestContext::with_request_id)
        .unwrap_or_default()
}

/// Observability middleware for Axum.
///
/// Route labels come from [`MatchedPath`] (e.g.
/// `/api/v1/keyvalue/:book/:canto/:verse`), which keeps metric cardinality
/// bounded by the route table.
pub async fn observability_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let span = info_span!(
        "http_request",
        otel.name = %format!("{} {}", method, route),
        otel.kind = "server",
        otel.status_code = Empty,
        http.method = %method,
        http.target = %path,
        http.route = %route,
        http.status_code = Empty,
        http.response_size = Empty,
        http.response_body = Empty,
        request_id = Empty,
    );
    let _ = span.set_parent(extract_trace_context(request.headers()));

    let mut ctx = request_context(request.headers());
    span.record("request_id", ctx.request_id());
    inject_trace_context(&span, &mut ctx);
    request.extensions_mut().insert(ctx);

    let response = next.run(request).instrument(span.clone()).await;

    let duration = start.elapsed();
    let status = response.status();
    span.record("http.status_code", status.as_u16());
    if status.is_server_error() {
        span.record("otel.status_code", "ERROR");
    }
    // Streamed bodies have no exact size and are not recorded.
    let response_size = response.body().size_hint().exact();
    if let Some(bytes) = response_size {
        span.record("http.response_size", bytes);
    }
    let (response, body) = capture_json_body(response, response_size).await;
    if let Some(body) = &body {
        span.record("http.response_body", body.as_str());
    }

    if let Some(metrics) = metrics() {
        metrics.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64());
        if let Some(bytes) = response_size {
            metrics.record_response_size(&route, status.as_u16(), bytes as usize);
        }
    }

    span.in_scope(|| {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            response_size,
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn, routing::get, Extension, Router};
    use tower::ServiceExt;

    async fn echo_request_id(Extension(ctx): Extension<RequestContext>) -> String {
        ctx.request_id().to_string()
    }

    async fn not_done_yet() -> (StatusCode, axum::Json<&'static str>) {
        (StatusCode::SERVICE_UNAVAILABLE, axum::Json("not done yet"))
    }

    fn app() -> Router {
        Router::new()
            .route("/echo/:id", get(echo_request_id))
            .route("/unavailable", get(not_done_yet))
            .layer(from_fn(observability_middleware))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_request_id_header_is_carried_into_context() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo/1")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "req-123");
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let response = app()
            .oneshot(Request::builder().uri("/echo/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(!body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_response_size_is_recorded() {
        let before = metrics()
            .map(|m| {
                m.http_response_size_bytes
                    .with_label_values(&["/echo/:id", "200"])
                    .get_sample_count()
            })
            .unwrap_or(0);

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo/2")
                    .header(REQUEST_ID_HEADER, "sized")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "sized");

        let after = metrics()
            .map(|m| {
                m.http_response_size_bytes
                    .with_label_values(&["/echo/:id", "200"])
                    .get_sample_count()
            })
            .unwrap_or(0);
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_json_body_passes_through_capture() {
        let response = app()
            .oneshot(Request::builder().uri("/unavailable").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(is_json(response.headers()));
        assert_eq!(body_string(response).await, r#""not done yet""#);
    }

    #[test]
    fn test_body_preview_is_bounded() {
        assert_eq!(body_preview(br#""Created""#), r#""Created""#);

        let long = vec![b'a'; RECORDED_BODY_BYTES * 2];
        let preview = body_preview(&long);
        assert_eq!(preview.len(), RECORDED_BODY_BYTES + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_request_context_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(!request_context(&headers).request_id().is_empty());

        headers.insert(REQUEST_ID_HEADER, "abc".parse().unwrap());
        assert_eq!(request_context(&headers).request_id(), "abc");
    }
}
