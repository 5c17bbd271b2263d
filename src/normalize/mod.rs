//! Record normalization: heterogeneous source payloads into canonical records.
//!
//! # Overview
//!
//! [`normalize`] is a pure function from one [`RawPayload`] to exactly one
//! [`CanonicalRecord`]. Title and URL are required; everything else is
//! optional and cleaned on the way in.
//!
//! # Example
//!
//! ```
//! use digest_core::normalize::{RawPayload, normalize};
//! use digest_core::record::Source;
//!
//! let raw = serde_json::json!({
//!     "title": "  Code  Generation with LLMs ",
//!     "url": "arxiv.org/abs/2401.00001",
//! });
//! let payload = RawPayload::from_json(Source::Paper, raw).unwrap();
//! let record = normalize(payload).unwrap();
//! assert_eq!(record.identity_key, "code generation with llms");
//! assert_eq!(record.url, "https://arxiv.org/abs/2401.00001");
//! ```

mod error;
mod payload;
mod text;

pub use error::NormalizeError;
pub use payload::{PaperPayload, RawPayload, RepositoryPayload};
pub use text::{
    clean_text, clean_url, identity_key, normalize_doi, normalize_title_key, parse_timestamp,
};

use tracing::{debug, instrument};

use crate::record::{CanonicalRecord, PopularityMetric, Source};

/// Converts one raw payload into a canonical record.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedPayload`] when the title or URL is
/// missing, blank, or unusable.
#[instrument(level = "debug", skip(payload), fields(source = %payload.source()))]
pub fn normalize(payload: RawPayload) -> Result<CanonicalRecord, NormalizeError> {
    match payload {
        RawPayload::Paper(paper) => normalize_paper(paper),
        RawPayload::Repository(repo) => normalize_repository(repo),
    }
}

fn required_title(source: Source, raw: Option<&str>) -> Result<String, NormalizeError> {
    let title = clean_text(raw.unwrap_or_default());
    if title.is_empty() {
        return Err(NormalizeError::missing_field(source, "title"));
    }
    Ok(title)
}

fn required_url(source: Source, raw: Option<&str>) -> Result<String, NormalizeError> {
    let Some(raw) = raw.filter(|url| !url.trim().is_empty()) else {
        return Err(NormalizeError::missing_field(source, "url"));
    };
    clean_url(raw).ok_or_else(|| NormalizeError::invalid_url(source, raw))
}

fn checked_identity_key(
    source: Source,
    title: &str,
    external_id: Option<&str>,
) -> Result<String, NormalizeError> {
    let key = identity_key(source, title, external_id);
    if key.is_empty() {
        return Err(NormalizeError::MalformedPayload {
            kind: source,
            reason: format!("title '{title}' has no matchable characters"),
        });
    }
    Ok(key)
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = clean_text(&name);
        if !name.is_empty() && !cleaned.contains(&name) {
            cleaned.push(name);
        }
    }
    cleaned
}

fn parse_published(source: Source, raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        debug!(%source, value = raw, "unparseable publication date, leaving unset");
    }
    parsed
}

fn normalize_paper(paper: PaperPayload) -> Result<CanonicalRecord, NormalizeError> {
    let source = Source::Paper;
    let title = required_title(source, paper.title.as_deref())?;
    let url = required_url(source, paper.url.as_deref().or(paper.pdf_url.as_deref()))?;
    let doi = paper.doi.as_deref().and_then(normalize_doi);
    let key = checked_identity_key(source, &title, doi.as_deref())?;

    let mut record = CanonicalRecord::new(source, key, title, url);
    record.description = clean_text(paper.description.as_deref().unwrap_or_default());
    record.authors = clean_names(paper.authors);
    record.published_at = parse_published(source, paper.published.as_deref());
    record.raw_popularity = paper.citation_count.map(PopularityMetric::Citations);
    record.external_id = doi;
    record.source_categories = clean_names(paper.categories);
    Ok(record)
}

fn normalize_repository(repo: RepositoryPayload) -> Result<CanonicalRecord, NormalizeError> {
    let source = Source::Repository;
    let title = required_title(source, repo.title.as_deref().or(repo.full_name.as_deref()))?;
    let url = required_url(source, repo.url.as_deref())?;
    let full_name = repo
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from);
    let key = checked_identity_key(source, &title, full_name.as_deref())?;

    let mut record = CanonicalRecord::new(source, key, title, url);
    record.description = clean_text(repo.description.as_deref().unwrap_or_default());
    record.authors = if repo.authors.is_empty() {
        clean_names(repo.owner.into_iter().collect())
    } else {
        clean_names(repo.authors)
    };
    record.published_at = parse_published(source, repo.published.as_deref());
    record.raw_popularity = repo.stars.map(PopularityMetric::Stars);
    record.external_id = full_name;
    record.source_categories = clean_names(repo.topics);
    record.language = repo
        .language
        .map(|language| language.trim().to_string())
        .filter(|language| !language.is_empty());
    Ok(record)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn paper(value: serde_json::Value) -> RawPayload {
        RawPayload::from_json(Source::Paper, value).unwrap()
    }

    fn repo(value: serde_json::Value) -> RawPayload {
        RawPayload::from_json(Source::Repository, value).unwrap()
    }

    #[test]
    fn test_normalize_paper_full_payload() {
        let record = normalize(paper(json!({
            "title": "LLM   Program Repair",
            "url": "https://arxiv.org/abs/2401.1",
            "abstract": "We fix  bugs.",
            "authors": ["Ada", "Grace", "Ada"],
            "published": "2024-01-05T10:00:00Z",
            "categories": ["cs.SE", "cs.LG"],
            "citation_count": 12
        })))
        .unwrap();

        assert_eq!(record.source, Source::Paper);
        assert_eq!(record.title, "LLM Program Repair");
        assert_eq!(record.identity_key, "llm program repair");
        assert_eq!(record.description, "We fix bugs.");
        assert_eq!(record.authors, vec!["Ada", "Grace"]);
        assert_eq!(record.raw_popularity, Some(PopularityMetric::Citations(12)));
        assert!(record.published_at.is_some());
        assert!(record.category_tags.is_empty());
        assert!(record.composite_score().is_none());
    }

    #[test]
    fn test_normalize_paper_with_doi_uses_prefixed_key() {
        let record = normalize(paper(json!({
            "title": "Whatever",
            "url": "https://example.org/p",
            "doi": "https://doi.org/10.1145/ABC.1"
        })))
        .unwrap();
        assert_eq!(record.identity_key, "paper:10.1145/abc.1");
        assert_eq!(record.external_id.as_deref(), Some("10.1145/ABC.1"));
    }

    #[test]
    fn test_normalize_paper_falls_back_to_pdf_url() {
        let record = normalize(paper(json!({
            "title": "T",
            "pdf_url": "https://arxiv.org/pdf/2401.1"
        })))
        .unwrap();
        assert_eq!(record.url, "https://arxiv.org/pdf/2401.1");
    }

    #[test]
    fn test_normalize_repository_maps_stars_topics_owner() {
        let record = normalize(repo(json!({
            "name": "fast-tool",
            "full_name": "Acme/fast-tool",
            "html_url": "https://github.com/Acme/fast-tool",
            "description": "A  tool",
            "stargazers_count": 1500,
            "language": "Rust",
            "topics": ["llm", "agents"],
            "created_at": "2024-02-01T00:00:00Z",
            "owner": "Acme"
        })))
        .unwrap();

        assert_eq!(record.identity_key, "repository:acme/fast-tool");
        assert_eq!(record.raw_popularity, Some(PopularityMetric::Stars(1500)));
        assert_eq!(record.authors, vec!["Acme"]);
        assert_eq!(record.source_categories, vec!["llm", "agents"]);
        assert_eq!(record.language.as_deref(), Some("Rust"));
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let err = normalize(paper(json!({"url": "https://a.org"}))).unwrap_err();
        assert!(err.to_string().contains("`title`"));
    }

    #[test]
    fn test_blank_url_is_malformed() {
        let err = normalize(repo(json!({"title": "x", "url": "   "}))).unwrap_err();
        assert!(err.to_string().contains("`url`"));
    }

    #[test]
    fn test_punctuation_only_title_is_malformed() {
        let err = normalize(paper(json!({"title": "?!", "url": "https://a.org"}))).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedPayload { .. }));
    }

    #[test]
    fn test_unparseable_date_is_left_unset() {
        let record = normalize(paper(json!({
            "title": "T",
            "url": "https://a.org",
            "published": "sometime"
        })))
        .unwrap();
        assert!(record.published_at.is_none());
    }
}
