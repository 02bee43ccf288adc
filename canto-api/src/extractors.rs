//! Custom extractors for histogram keys and request context.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use canto_core::{HistogramKey, RequestContext, REQUEST_ID_HEADER};

use crate::error::ApiError;

/// Extractor for a [`HistogramKey`] from `/:book/:canto/:verse`.
///
/// Rejects with a 400 [`ApiError`] when a segment is not a valid key
/// segment.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_histogram(KeyPath(key): KeyPath) -> Response {
///     // key.store_key() == "inferno:cantoi:1"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KeyPath(pub HistogramKey);

#[async_trait]
impl<S> FromRequestParts<S> for KeyPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((book, canto, verse)): Path<(String, String, String)> =
            Path::from_request_parts(parts, state)
                .await
                .map_err(|e| ApiError::invalid_key(parts.uri.path(), e))?;

        Ok(KeyPath(HistogramKey::new(book, canto, verse)?))
    }
}

/// Extractor for the [`RequestContext`] installed by the observability
/// middleware.
///
/// Falls back to a fresh context (honouring `x-request-id`) on routers
/// without the middleware.
#[derive(Debug, Clone)]
pub struct RequestCtx(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequestCtx
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(RequestCtx(ctx.clone()));
        }
        let ctx = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(RequestContext::with_request_id)
            .unwrap_or_default();
        Ok(RequestCtx(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::{body::Body, response::IntoResponse, routing::get, Router};
    use tower::ServiceExt;

    async fn echo(KeyPath(key): KeyPath, RequestCtx(ctx): RequestCtx) -> String {
        format!("{} {}", key, ctx.request_id())
    }

    fn app() -> Router {
        Router::new().route("/:book/:canto/:verse", get(echo))
    }

    #[tokio::test]
    async fn test_valid_key() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/inferno/cantoi/1")
                    .header(REQUEST_ID_HEADER, "r1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"inferno:cantoi:1 r1");
    }

    #[tokio::test]
    async fn test_invalid_segment_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/inferno/canto%3Ai/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rejection_is_structured() {
        let response = ApiError::invalid_key("/a/b", "bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
