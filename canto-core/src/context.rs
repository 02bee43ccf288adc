//! Per-request context threaded alongside core calls.
//!
//! Trace propagation headers are carried as opaque strings. The core never
//! reads them; the HTTP layer fills them in on the way in and the document
//! fetcher copies them onto upstream requests on the way out.

use std::collections::BTreeMap;

use uuid::Uuid;

/// Header used to correlate a request across services.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    trace_headers: BTreeMap<String, String>,
}

impl RequestContext {
    /// Context with a fresh UUIDv7 request id and no trace headers.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::now_v7().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            trace_headers: BTreeMap::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Record a propagation header. Names are stored lowercase.
    pub fn insert_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.trace_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.trace_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Propagation headers to copy onto outbound requests.
    pub fn trace_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.trace_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
