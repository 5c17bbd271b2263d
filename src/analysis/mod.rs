//! Analysis adapter: oracle invocation, reply validation, and retries.
//!
//! The oracle is an external, unreliable text-analysis service behind the
//! [`AnalysisOracle`] trait. Its replies are untrusted JSON and pass through
//! [`schema::validate`] before touching a record. Failed calls are retried
//! per [`RetryPolicy`]; a record whose oracle is unavailable still proceeds
//! with defaulted dimensions (see [`fallback::unavailable`]).
//!
//! [`AnalysisEngine`] drives one oracle call per record with bounded
//! concurrency and returns records in their original order.

pub mod chat;
mod engine;
mod error;
pub mod fallback;
mod retry;
pub mod schema;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::record::{CanonicalRecord, PopularityMetric, Source};

pub use chat::ChatCompletionsOracle;
pub use engine::{AnalysisEngine, AnalysisStats, DEFAULT_CONCURRENCY, EngineError};
pub use error::OracleError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};

/// Longest description excerpt sent to the oracle, in characters.
const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Structured input for one oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleRequest {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: Source,
    /// Source-specific context line (authors and categories, or stars and topics).
    pub additional_context: String,
}

impl OracleRequest {
    /// Builds the request for a record, truncating long descriptions.
    #[must_use]
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let description = if record.description.is_empty() {
            "No description available".to_string()
        } else {
            record.description.chars().take(MAX_DESCRIPTION_CHARS).collect()
        };
        Self {
            title: record.title.clone(),
            description,
            url: record.url.clone(),
            source: record.source,
            additional_context: additional_context(record),
        }
    }

    /// Renders the user prompt for chat-style oracles.
    #[must_use]
    pub fn prompt(&self, vocabulary: &[String]) -> String {
        format!(
            "Analyze the following {source} and respond with a single JSON object.\n\
             \n\
             Title: {title}\n\
             URL: {url}\n\
             Details: {context}\n\
             Description: {description}\n\
             \n\
             Required keys:\n\
             - \"background\": string, the problem context\n\
             - \"technical_highlights\": array of strings\n\
             - \"applications\": array of strings\n\
             - \"audience\": string\n\
             - \"category_tags\": 1 to 3 of [{tags}]\n\
             - \"relevance_score\": number from 1 to 10\n\
             - \"summary\": string, two or three sentences\n\
             - \"scoring_dimensions\": object with numbers from 1 to 10 for \
             \"technical_innovation\", \"application_value\", \"readability\", \
             \"experimental_thoroughness\"",
            source = self.source,
            title = self.title,
            url = self.url,
            context = self.additional_context,
            description = self.description,
            tags = vocabulary.join(", "),
        )
    }
}

fn additional_context(record: &CanonicalRecord) -> String {
    match record.source {
        Source::Paper => format!(
            "Authors: {}; Categories: {}",
            record.authors.join(", "),
            record.source_categories.join(", ")
        ),
        Source::Repository => {
            let stars = match record.raw_popularity {
                Some(PopularityMetric::Stars(stars)) => stars,
                _ => 0,
            };
            format!(
                "Stars: {stars}; Language: {}; Topics: {}",
                record.language.as_deref().unwrap_or("N/A"),
                record.source_categories.join(", ")
            )
        }
    }
}

/// External text-analysis service.
///
/// Implementations return the reply as untrusted JSON; validation happens in
/// the engine.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    /// Analyzes one record.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] when the call fails or the reply is not JSON.
    async fn analyze(&self, request: &OracleRequest, vocabulary: &[String])
    -> Result<Value, OracleError>;
}

/// Oracle that is never reachable; every record is analyzed by keyword fallback.
///
/// Used when no credentials are configured.
#[derive(Debug, Clone)]
pub struct OfflineOracle {
    reason: String,
}

impl OfflineOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AnalysisOracle for OfflineOracle {
    async fn analyze(
        &self,
        _request: &OracleRequest,
        _vocabulary: &[String],
    ) -> Result<Value, OracleError> {
        Err(OracleError::configuration(self.reason.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_request_context_lists_authors_and_categories() {
        let mut record = CanonicalRecord::new(Source::Paper, "k", "T", "https://arxiv.org/abs/1");
        record.authors = vec!["Ada".into(), "Grace".into()];
        record.source_categories = vec!["cs.SE".into()];
        let request = OracleRequest::from_record(&record);
        assert_eq!(request.additional_context, "Authors: Ada, Grace; Categories: cs.SE");
        assert_eq!(request.description, "No description available");
    }

    #[test]
    fn test_repository_request_context_lists_stars_language_topics() {
        let mut record =
            CanonicalRecord::new(Source::Repository, "k", "T", "https://github.com/a/b");
        record.raw_popularity = Some(PopularityMetric::Stars(12));
        record.language = Some("Rust".into());
        record.source_categories = vec!["llm".into(), "agents".into()];
        let request = OracleRequest::from_record(&record);
        assert_eq!(
            request.additional_context,
            "Stars: 12; Language: Rust; Topics: llm, agents"
        );
    }

    #[test]
    fn test_long_description_is_truncated() {
        let mut record = CanonicalRecord::new(Source::Paper, "k", "T", "u");
        record.description = "é".repeat(MAX_DESCRIPTION_CHARS + 50);
        let request = OracleRequest::from_record(&record);
        assert_eq!(request.description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_prompt_names_vocabulary_and_dimensions() {
        let record = CanonicalRecord::new(Source::Paper, "k", "Title X", "u");
        let prompt = OracleRequest::from_record(&record)
            .prompt(&["benchmark".to_string(), "tool".to_string()]);
        assert!(prompt.contains("Title: Title X"));
        assert!(prompt.contains("[benchmark, tool]"));
        assert!(prompt.contains("experimental_thoroughness"));
    }

    #[tokio::test]
    async fn test_offline_oracle_reports_configuration_error() {
        let oracle = OfflineOracle::new("no API key");
        let record = CanonicalRecord::new(Source::Paper, "k", "T", "u");
        let err = oracle
            .analyze(&OracleRequest::from_record(&record), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Configuration { .. }));
    }
}
