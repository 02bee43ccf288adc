//! Word Histogram REST API Routes
//!
//! `GET` returns the histogram for a key, populating it from the document
//! store on a miss. `POST` replaces it with the counts of the posted text.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use canto_core::{CantoResult, Histogram};
use canto_storage::CacheRead;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    extractors::{KeyPath, RequestCtx},
    state::{ApiCache, AppState},
    telemetry::metrics,
};

/// Body of `POST /api/v1/keyvalue/{book}/{canto}/{verse}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetWordsRequest {
    /// Free text to tokenize and count
    #[serde(default)]
    pub words: Option<String>,
}

/// Body returned by a successful `POST`.
pub const CREATED_BODY: &str = "Created";

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/keyvalue/{book}/{canto}/{verse} - Word histogram for a key
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/keyvalue/{book}/{canto}/{verse}",
    tag = "Histograms",
    params(
        ("book" = String, Path, description = "Book, e.g. inferno"),
        ("canto" = String, Path, description = "Canto, e.g. cantoi"),
        ("verse" = String, Path, description = "Verse number"),
    ),
    responses(
        (status = 200, description = "Word counts", body = Histogram),
        (status = 400, description = "Invalid key", body = ApiError),
        (status = 404, description = "No source document for the key", body = ApiError),
        (status = 500, description = "Histogram store failure", body = ApiError),
        (status = 502, description = "Source document is not usable", body = ApiError),
        (status = 503, description = "Document store unavailable", body = String),
        (status = 504, description = "Populate pass timed out", body = ApiError),
    ),
))]
pub async fn get_histogram(
    State(cache): State<Arc<ApiCache>>,
    KeyPath(key): KeyPath,
    RequestCtx(ctx): RequestCtx,
) -> ApiResult<impl IntoResponse> {
    let result = cache.get_histogram(&key, &ctx).await;
    record_read(&result);

    let read = result?;
    tracing::debug!(
        key = %key,
        origin = read.origin().as_str(),
        words = read.value().len(),
        read_at = %read.read_at(),
        "Served histogram"
    );
    Ok((StatusCode::OK, Json(read.into_value())))
}

/// POST /api/v1/keyvalue/{book}/{canto}/{verse} - Replace a histogram from text
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/keyvalue/{book}/{canto}/{verse}",
    tag = "Histograms",
    params(
        ("book" = String, Path, description = "Book, e.g. inferno"),
        ("canto" = String, Path, description = "Canto, e.g. cantoi"),
        ("verse" = String, Path, description = "Verse number"),
    ),
    request_body = SetWordsRequest,
    responses(
        (status = 201, description = "Histogram replaced", body = String),
        (status = 400, description = "Invalid key or body", body = ApiError),
        (status = 500, description = "Histogram store failure", body = ApiError),
    ),
))]
pub async fn set_words(
    State(cache): State<Arc<ApiCache>>,
    KeyPath(key): KeyPath,
    RequestCtx(ctx): RequestCtx,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: SetWordsRequest = serde_json::from_slice(&body)?;
    let text = req.words.ok_or_else(|| ApiError::missing_field("words"))?;

    let tokens = cache.set_text(&key, &text, &ctx).await?;
    tracing::info!(key = %key, tokens, "Stored histogram from posted text");
    Ok((StatusCode::CREATED, Json(CREATED_BODY)))
}

fn record_read(result: &CantoResult<CacheRead<Histogram>>) {
    let Some(metrics) = metrics() else {
        return;
    };
    match result {
        Ok(read) => metrics.record_lookup(read.origin().as_str()),
        Err(_) => metrics.record_lookup("error"),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the histogram router, mounted at `/api/v1/keyvalue`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:book/:canto/:verse", get(get_histogram).post(set_words))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_words_request_parsing() {
        let req: SetWordsRequest = serde_json::from_str(r#"{"words": "a a b"}"#).unwrap();
        assert_eq!(req.words.as_deref(), Some("a a b"));

        let req: SetWordsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.words.is_none());

        assert!(serde_json::from_str::<SetWordsRequest>("not json").is_err());
    }

    #[test]
    fn test_created_body_is_json_string() {
        assert_eq!(serde_json::to_string(&CREATED_BODY).unwrap(), r#""Created""#);
    }
}
