//! Error types for payload normalization.

use thiserror::Error;

use crate::record::Source;

/// Errors that can occur while normalizing one raw payload.
///
/// Every variant is scoped to a single record: the pipeline logs it, drops
/// the payload, and keeps processing the rest of the batch.
#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    /// A required field is absent, blank, or of the wrong type.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        /// Which fetcher produced the payload.
        kind: Source,
        /// What made the payload unusable.
        reason: String,
    },
}

impl NormalizeError {
    /// Creates a `MalformedPayload` error for a missing or blank required field.
    #[must_use]
    pub fn missing_field(kind: Source, field: &str) -> Self {
        Self::MalformedPayload {
            kind,
            reason: format!("required field `{field}` is missing or blank"),
        }
    }

    /// Creates a `MalformedPayload` error for a payload that does not match the expected shape.
    #[must_use]
    pub fn invalid_shape(kind: Source, detail: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            kind,
            reason: format!("unexpected payload shape: {detail}"),
        }
    }

    /// Creates a `MalformedPayload` error for an unusable URL.
    #[must_use]
    pub fn invalid_url(kind: Source, url: &str) -> Self {
        Self::MalformedPayload {
            kind,
            reason: format!("url '{url}' is not a valid http(s) URL"),
        }
    }
}
