//! Keyword heuristics used when the oracle cannot classify a record.

use std::collections::BTreeMap;

use crate::record::{Analysis, AnalysisStatus, CanonicalRecord, OTHER_TAG};
use crate::scoring::Dimension;

use super::schema::{AnalysisOutcome, FieldOutcome, FieldReport, MIDPOINT_SCORE};

/// Most tags the keyword classifier assigns.
const MAX_FALLBACK_TAGS: usize = 2;

/// Category tag and the phrases that suggest it, in priority order.
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "code_generation",
        &["code generation", "code synthesis", "program generation", "automatic programming"],
    ),
    (
        "code_evaluation",
        &["code evaluation", "code assessment", "code quality", "code metrics", "code analysis"],
    ),
    (
        "code_verification",
        &["code verification", "formal verification", "program verification", "correctness"],
    ),
    (
        "program_synthesis",
        &["program synthesis", "synthesis", "automated synthesis"],
    ),
    (
        "coding_agent",
        &["coding agent", "programming agent", "software agent", "ai agent", "autonomous"],
    ),
    (
        "llm_coding",
        &["llm", "large language model", "language model", "gpt", "transformer", "neural"],
    ),
    (
        "automated_testing",
        &["test generation", "automated testing", "unit test", "test case"],
    ),
    (
        "software_reasoning",
        &["reasoning", "logic", "inference", "proof", "symbolic"],
    ),
    (
        "code_repair",
        &["code repair", "bug fix", "program repair", "debugging", "error correction"],
    ),
    (
        "neural_search",
        &["code search", "semantic search", "code retrieval", "neural search"],
    ),
    (
        "benchmark",
        &["benchmark", "evaluation", "dataset", "corpus", "leaderboard"],
    ),
    (
        "survey",
        &["survey", "review", "analysis", "study", "empirical"],
    ),
    (
        "tool",
        &["tool", "framework", "library", "system", "platform", "implementation"],
    ),
];

const MANUAL_ANALYSIS: &str = "Manual analysis required";

const HIGH_RELEVANCE: &[&str] = &[
    "code generation",
    "llm",
    "programming",
    "software engineering",
    "automated",
    "ai coding",
];

const MEDIUM_RELEVANCE: &[&str] = &[
    "machine learning",
    "neural",
    "algorithm",
    "development",
    "programming language",
];

/// Every tag the keyword classifier can produce, plus [`OTHER_TAG`].
#[must_use]
pub fn default_category_tags() -> Vec<String> {
    CATEGORY_PATTERNS
        .iter()
        .map(|(tag, _)| *tag)
        .chain(std::iter::once(OTHER_TAG))
        .map(String::from)
        .collect()
}

/// Up to two category tags matched by phrase, or `["other"]`.
#[must_use]
pub fn classify_by_keywords(title: &str, description: &str) -> Vec<String> {
    keyword_tags(title, description, |_| true)
}

/// Matched tags accepted by `keep`, in priority order, capped after filtering.
fn keyword_tags(title: &str, description: &str, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let text = format!("{title} {description}").to_lowercase();
    let tags: Vec<String> = CATEGORY_PATTERNS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|phrase| text.contains(phrase)))
        .map(|(tag, _)| *tag)
        .filter(|tag| keep(tag))
        .take(MAX_FALLBACK_TAGS)
        .map(String::from)
        .collect();
    if tags.is_empty() {
        vec![OTHER_TAG.to_string()]
    } else {
        tags
    }
}

/// Keyword relevance estimate in `[4, 8]`.
#[must_use]
pub fn estimate_relevance(title: &str, description: &str) -> f64 {
    let text = format!("{title} {description}").to_lowercase();
    let count = |phrases: &[&str]| phrases.iter().filter(|p| text.contains(**p)).count();
    match (count(HIGH_RELEVANCE), count(MEDIUM_RELEVANCE)) {
        (high, _) if high >= 2 => 8.0,
        (1, _) => 7.0,
        (_, medium) if medium >= 2 => 6.0,
        (_, 1) => 5.0,
        _ => 4.0,
    }
}

/// Keyword tags restricted to `vocabulary`, falling back to [`OTHER_TAG`].
pub(crate) fn fallback_tags(record: &CanonicalRecord, vocabulary: &[String]) -> Vec<String> {
    keyword_tags(&record.title, &record.description, |tag| {
        vocabulary.iter().any(|known| known == tag)
    })
}

/// Analysis for a record the oracle could not serve.
///
/// Every oracle dimension is the midpoint; tags and relevance come from keywords.
#[must_use]
pub fn unavailable(
    record: &CanonicalRecord,
    reason: impl Into<String>,
    vocabulary: &[String],
) -> AnalysisOutcome {
    let reason = reason.into();
    let dimension_scores: BTreeMap<Dimension, f64> = Dimension::ORACLE
        .into_iter()
        .map(|dimension| (dimension, MIDPOINT_SCORE))
        .collect();
    let fields = Dimension::ORACLE
        .into_iter()
        .map(|dimension| FieldReport {
            field: dimension.as_str().to_string(),
            outcome: FieldOutcome::Defaulted {
                reason: reason.clone(),
            },
        })
        .collect();
    let title: String = record.title.chars().take(100).collect();

    AnalysisOutcome {
        analysis: Analysis {
            background: "Analysis not available - manual review needed".to_string(),
            technical_highlights: vec![MANUAL_ANALYSIS.to_string()],
            applications: Vec::new(),
            audience: "AI researchers and developers".to_string(),
            summary: format!("Manual summary needed for: {title}"),
            relevance_score: estimate_relevance(&record.title, &record.description),
            status: AnalysisStatus::Unavailable,
            degraded_reason: Some(reason),
        },
        category_tags: fallback_tags(record, vocabulary),
        dimension_scores,
        fields,
    }
}
