//! Composite histogram keys.
//!
//! A `HistogramKey` names one text unit (`book:canto:verse`) and therefore one
//! histogram. Keys can only be built through validating constructors, so a
//! segment containing the delimiter can never alias another key in the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Delimiter between key segments in the store representation.
pub const KEY_DELIMITER: char = ':';

/// A validated `book:canto:verse` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistogramKey {
    inner: KeyInner,
}

/// Private inner struct - prevents construction without validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct KeyInner {
    book: String,
    canto: String,
    verse: String,
}

impl HistogramKey {
    /// Build a key from its three segments.
    ///
    /// Segments must be non-empty and must not contain `:`, `/` or
    /// whitespace.
    pub fn new(
        book: impl Into<String>,
        canto: impl Into<String>,
        verse: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let book = book.into();
        let canto = canto.into();
        let verse = verse.into();

        validate_segment("book", &book)?;
        validate_segment("canto", &canto)?;
        validate_segment("verse", &verse)?;

        Ok(Self {
            inner: KeyInner { book, canto, verse },
        })
    }

    /// Parse the store representation `book:canto:verse`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut parts = raw.split(KEY_DELIMITER);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(book), Some(canto), Some(verse), None) => Self::new(book, canto, verse),
            _ => Err(ValidationError::InvalidKey {
                key: raw.to_string(),
                reason: "expected exactly three segments joined by ':'".to_string(),
            }),
        }
    }

    pub fn book(&self) -> &str {
        &self.inner.book
    }

    pub fn canto(&self) -> &str {
        &self.inner.canto
    }

    pub fn verse(&self) -> &str {
        &self.inner.verse
    }

    /// The string used as the store key.
    pub fn store_key(&self) -> String {
        self.to_string()
    }
}

fn validate_segment(name: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: name.to_string(),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| *c == KEY_DELIMITER || *c == '/' || c.is_whitespace())
    {
        return Err(ValidationError::InvalidKey {
            key: value.to_string(),
            reason: format!("{} segment contains forbidden character {:?}", name, bad),
        });
    }
    Ok(())
}

impl fmt::Display for HistogramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.inner.book,
            self.inner.canto,
            self.inner.verse,
            d = KEY_DELIMITER
        )
    }
}

impl FromStr for HistogramKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HistogramKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HistogramKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
