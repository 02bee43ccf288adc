//! Canto Core - Shared Types
//!
//! Keys, histograms, source documents, the whitespace tokenizer and the
//! error taxonomy. Every other crate in the workspace depends on this one;
//! it performs no I/O.

pub mod context;
pub mod document;
pub mod error;
pub mod histogram;
pub mod key;
pub mod tokenizer;

use chrono::{DateTime, Utc};

pub use context::{RequestContext, REQUEST_ID_HEADER};
pub use document::{SourceDocument, TextLanguage};
pub use error::{
    CantoError, CantoResult, ConfigError, StoreError, UpstreamError, ValidationError,
};
pub use histogram::Histogram;
pub use key::{HistogramKey, KEY_DELIMITER};
pub use tokenizer::{count_words, tokenize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
