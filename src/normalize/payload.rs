//! Source-specific raw payload shapes produced by the fetchers.
//!
//! Every field is optional at this layer so a single bad value surfaces as a
//! [`NormalizeError::MalformedPayload`] for that record instead of failing the
//! whole file during deserialization.

use serde::Deserialize;
use serde_json::Value;

use super::NormalizeError;
use crate::record::Source;

/// Paper metadata as emitted by the arXiv fetcher.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaperPayload {
    pub title: Option<String>,
    #[serde(alias = "entry_id")]
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    #[serde(alias = "abstract", alias = "summary")]
    pub description: Option<String>,
    pub authors: Vec<String>,
    #[serde(alias = "published_at")]
    pub published: Option<String>,
    pub categories: Vec<String>,
    pub doi: Option<String>,
    pub citation_count: Option<u64>,
}

/// Repository metadata as emitted by the code-hosting fetcher.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryPayload {
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub full_name: Option<String>,
    #[serde(alias = "html_url")]
    pub url: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "stargazers_count")]
    pub stars: Option<u64>,
    pub language: Option<String>,
    pub topics: Vec<String>,
    #[serde(alias = "created_at")]
    pub published: Option<String>,
    pub owner: Option<String>,
    pub authors: Vec<String>,
}

/// One raw record from either source.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Paper(PaperPayload),
    Repository(RepositoryPayload),
}

impl RawPayload {
    /// Returns which source produced this payload.
    #[must_use]
    pub fn source(&self) -> Source {
        match self {
            Self::Paper(_) => Source::Paper,
            Self::Repository(_) => Source::Repository,
        }
    }

    /// Decodes one JSON object from the given source's fetcher output.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedPayload`] when the value is not an
    /// object or a field has the wrong type.
    pub fn from_json(source: Source, value: Value) -> Result<Self, NormalizeError> {
        if !value.is_object() {
            return Err(NormalizeError::invalid_shape(source, "expected a JSON object"));
        }
        match source {
            Source::Paper => serde_json::from_value(value)
                .map(Self::Paper)
                .map_err(|e| NormalizeError::invalid_shape(source, e)),
            Source::Repository => serde_json::from_value(value)
                .map(Self::Repository)
                .map_err(|e| NormalizeError::invalid_shape(source, e)),
        }
    }
}
