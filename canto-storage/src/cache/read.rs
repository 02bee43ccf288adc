//! Read results carrying their origin.

use canto_core::Timestamp;
use chrono::Utc;

/// Where a read's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// The histogram already existed.
    Cache,
    /// This call ran the populate pass.
    Populated,
}

impl ReadOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadOrigin::Cache => "hit",
            ReadOrigin::Populated => "miss",
        }
    }
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    origin: ReadOrigin,
    read_at: Timestamp,
}

impl<T> CacheRead<T> {
    /// A read served from an existing histogram.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            origin: ReadOrigin::Cache,
            read_at: Utc::now(),
        }
    }

    /// A read that ran the populate pass.
    pub fn from_source(value: T) -> Self {
        Self {
            value,
            origin: ReadOrigin::Populated,
            read_at: Utc::now(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn origin(&self) -> ReadOrigin {
        self.origin
    }

    pub fn was_cache_hit(&self) -> bool {
        self.origin == ReadOrigin::Cache
    }

    pub fn read_at(&self) -> Timestamp {
        self.read_at
    }

    /// Transform the value, keeping the metadata.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            origin: self.origin,
            read_at: self.read_at,
        }
    }
}
