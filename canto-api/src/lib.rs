//! Canto API - HTTP Layer for the Word-Count Cache
//!
//! Serves per-verse word histograms over REST (Axum). Histograms live in a
//! Redis (or in-memory) store and are populated from the document store on
//! first read.

pub mod config;
pub mod error;
pub mod extractors;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used types
pub use config::{ApiConfig, OAuthConfig, StoreBackend};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use extractors::{KeyPath, RequestCtx};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::{ApiCache, AppState};
pub use upstream::{HttpDocumentFetcher, TokenClient};
