//! Canonical record shared by every pipeline stage.
//!
//! A [`CanonicalRecord`] is created by the normalizer, merged by the
//! deduplicator, enriched by the analysis adapter, finalized by the composite
//! scorer, and read (never mutated) by the selector.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{Dimension, ScoreBreakdown, ScoreError};

/// Category tag used when nothing else applies.
pub const OTHER_TAG: &str = "other";

/// Origin of a research artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Academic paper (arXiv-style metadata).
    Paper,
    /// Source code repository.
    Repository,
}

impl Source {
    /// Returns the stable lowercase label used in identity keys and output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Repository => "repository",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-native popularity signal, tagged with its unit.
///
/// Units are never mixed: citation counts and star counts are normalized by
/// different scales in [`crate::scoring::popularity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum PopularityMetric {
    /// Citation count (or a citation-count proxy) for a paper.
    Citations(u64),
    /// Star count for a repository.
    Stars(u64),
}

impl PopularityMetric {
    /// Raw numeric value regardless of unit.
    #[must_use]
    pub fn value(self) -> u64 {
        match self {
            Self::Citations(value) | Self::Stars(value) => value,
        }
    }
}

/// Outcome of the oracle analysis for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Every expected field was present and in range (possibly repaired).
    Complete,
    /// The oracle answered but at least one dimension had to be defaulted.
    Partial,
    /// The oracle could not be reached; all dimensions are defaulted.
    Unavailable,
}

/// Qualitative fields produced by the analysis adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub background: String,
    pub technical_highlights: Vec<String>,
    pub applications: Vec<String>,
    pub audience: String,
    pub summary: String,
    /// Overall relevance reported by the oracle, in `[1, 10]`.
    pub relevance_score: f64,
    pub status: AnalysisStatus,
    /// Why the analysis is not complete, when it is not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

/// The uniform internal representation of one research artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub source: Source,
    /// Normalized duplicate-matching key. Computed once by the normalizer.
    pub identity_key: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub authors: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_popularity: Option<PopularityMetric>,
    /// DOI for papers, `owner/name` for repositories.
    pub external_id: Option<String>,
    /// arXiv categories or repository topics, in first-seen order.
    pub source_categories: Vec<String>,
    pub language: Option<String>,
    /// Every source that contributed fields to this record.
    pub provenance: BTreeSet<Source>,
    /// Category tags in oracle order; the first tag is the primary category.
    pub category_tags: Vec<String>,
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub analysis: Option<Analysis>,
    composite_score: Option<f64>,
    score_breakdown: Option<ScoreBreakdown>,
}

impl CanonicalRecord {
    /// Creates an unanalyzed, unscored record.
    #[must_use]
    pub fn new(
        source: Source,
        identity_key: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            identity_key: identity_key.into(),
            title: title.into(),
            url: url.into(),
            description: String::new(),
            authors: Vec::new(),
            published_at: None,
            raw_popularity: None,
            external_id: None,
            source_categories: Vec::new(),
            language: None,
            provenance: BTreeSet::from([source]),
            category_tags: Vec::new(),
            dimension_scores: BTreeMap::new(),
            analysis: None,
            composite_score: None,
            score_breakdown: None,
        }
    }

    /// Returns the composite score once the scorer has finalized the record.
    #[must_use]
    pub fn composite_score(&self) -> Option<f64> {
        self.composite_score
    }

    /// Returns the per-dimension contribution behind the composite score.
    #[must_use]
    pub fn score_breakdown(&self) -> Option<&ScoreBreakdown> {
        self.score_breakdown.as_ref()
    }

    /// True when any dimension was default-substituted or the oracle was unavailable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.analysis
            .as_ref()
            .is_some_and(|analysis| analysis.status != AnalysisStatus::Complete)
    }

    /// Adds a category tag unless it is already present.
    pub fn add_category_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.category_tags.contains(&tag) {
            self.category_tags.push(tag);
        }
    }

    /// Sets the composite score. A record is scored exactly once.
    pub(crate) fn set_composite(
        &mut self,
        score: f64,
        breakdown: ScoreBreakdown,
    ) -> Result<(), ScoreError> {
        if self.composite_score.is_some() {
            return Err(ScoreError::AlreadyScored {
                identity_key: self.identity_key.clone(),
            });
        }
        self.composite_score = Some(score);
        self.score_breakdown = Some(breakdown);
        Ok(())
    }
}
