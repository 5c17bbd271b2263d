//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use digest_core::{RawPayload, Source};
use serde_json::Value;

/// Builds a payload from JSON, panicking on shape errors.
pub fn payload(source: Source, value: Value) -> RawPayload {
    RawPayload::from_json(source, value).unwrap()
}

/// A complete, in-range oracle reply tagged with `tag`.
pub fn oracle_reply(tag: &str, score: u32) -> Value {
    serde_json::json!({
        "background": "Context for the work.",
        "technical_highlights": ["A new decoding strategy"],
        "applications": ["Code review"],
        "audience": "ML engineers",
        "category_tags": [tag],
        "relevance_score": score,
        "summary": "A short summary.",
        "scoring_dimensions": {
            "technical_innovation": score,
            "application_value": score,
            "readability": score,
            "experimental_thoroughness": score
        }
    })
}
