//! Source documents owned by the upstream document store.
//!
//! The cache only ever reads these; the text field selected by
//! [`TextLanguage`] is what gets tokenized on a cache miss.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which canonical text field of a [`SourceDocument`] to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TextLanguage {
    #[default]
    Italian,
    English,
}

impl TextLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextLanguage::Italian => "italian",
            TextLanguage::English => "english",
        }
    }

    /// Name of the JSON field holding this language's text.
    pub fn field_name(&self) -> &'static str {
        match self {
            TextLanguage::Italian => "textItalian",
            TextLanguage::English => "textEnglish",
        }
    }
}

impl fmt::Display for TextLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextLanguage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "italian" | "it" => Ok(TextLanguage::Italian),
            "english" | "en" => Ok(TextLanguage::English),
            _ => Err(ConfigError::InvalidValue {
                field: "language".to_string(),
                value: s.to_string(),
                reason: "expected 'italian' or 'english'".to_string(),
            }),
        }
    }
}

/// One verse of the source text as served by the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub book: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub roman: String,
    #[serde(default)]
    pub arabic: i64,
    #[serde(default)]
    pub verse: i64,
    #[serde(default)]
    pub words: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_italian: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_english: Option<String>,
}

impl SourceDocument {
    /// The canonical text for `language`, if the document carries it.
    pub fn text(&self, language: TextLanguage) -> Option<&str> {
        match language {
            TextLanguage::Italian => self.text_italian.as_deref(),
            TextLanguage::English => self.text_english.as_deref(),
        }
    }
}
