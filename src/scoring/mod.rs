//! Composite scoring across weighted quality dimensions.
//!
//! The composite score is a pure function of a record's fields and the
//! configured [`ScoringWeights`]:
//!
//! ```text
//! composite = Σ weight[d] * value[d]     for d in Dimension::ALL
//! ```
//!
//! Oracle dimensions come from the analysis adapter (real or defaulted).
//! Derived dimensions ([`Dimension::Popularity`], [`Dimension::AuthorInfluence`])
//! are computed here from record metadata when the record does not already
//! carry them.

mod dimension;
pub mod influence;
pub mod popularity;
mod weights;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::record::CanonicalRecord;

pub use dimension::Dimension;
pub use influence::InfluenceEstimator;
pub use popularity::{LogScale, PopularityNormalizer, PopularityScale};
pub use weights::{ScoringWeights, WEIGHT_SUM_TOLERANCE, WeightsError};

/// Internal invariant violations raised while scoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    /// An oracle dimension has no value (not even a default).
    #[error("record {identity_key} has no value for dimension {dimension}")]
    MissingDimension {
        /// Record being scored.
        identity_key: String,
        /// Dimension without a value.
        dimension: Dimension,
    },

    /// The record already carries a composite score.
    #[error("record {identity_key} was already scored")]
    AlreadyScored {
        /// Record being scored.
        identity_key: String,
    },
}

/// One dimension's share of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionContribution {
    pub dimension: Dimension,
    /// Dimension value on the common `[0, 10]` scale.
    pub value: f64,
    pub weight: f64,
    /// `value * weight`.
    pub contribution: f64,
}

/// Per-dimension explanation of a composite score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub contributions: Vec<DimensionContribution>,
}

impl ScoreBreakdown {
    /// Contribution entry for one dimension.
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> Option<&DimensionContribution> {
        self.contributions
            .iter()
            .find(|entry| entry.dimension == dimension)
    }

    /// Sum of all contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|entry| entry.contribution).sum()
    }
}

/// Computes and records composite scores.
///
/// Weights are shared read-only; the scorer itself holds no per-record state.
#[derive(Debug)]
pub struct CompositeScorer {
    weights: Arc<ScoringWeights>,
    popularity: PopularityNormalizer,
    influence: InfluenceEstimator,
}

impl CompositeScorer {
    /// Scorer with the default popularity scales and influence list.
    #[must_use]
    pub fn new(weights: Arc<ScoringWeights>) -> Self {
        Self::with_estimators(
            weights,
            PopularityNormalizer::default(),
            InfluenceEstimator::default(),
        )
    }

    #[must_use]
    pub fn with_estimators(
        weights: Arc<ScoringWeights>,
        popularity: PopularityNormalizer,
        influence: InfluenceEstimator,
    ) -> Self {
        Self {
            weights,
            popularity,
            influence,
        }
    }

    /// Computes the composite score and its breakdown without touching the record.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::MissingDimension`] when an oracle dimension has
    /// no finite value.
    pub fn compute(&self, record: &CanonicalRecord) -> Result<(f64, ScoreBreakdown), ScoreError> {
        let mut breakdown = ScoreBreakdown::default();
        for dimension in Dimension::ALL {
            let value = self.dimension_value(record, dimension)?;
            let weight = self.weights.get(dimension);
            breakdown.contributions.push(DimensionContribution {
                dimension,
                value,
                weight,
                contribution: value * weight,
            });
        }
        let composite = breakdown.total().clamp(0.0, 10.0);
        Ok((composite, breakdown))
    }

    /// Fills derived dimensions, computes the composite, and stamps it on the record.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError`] when a dimension is missing or the record was
    /// already scored.
    pub fn finalize(&self, mut record: CanonicalRecord) -> Result<CanonicalRecord, ScoreError> {
        let popularity = self.popularity.normalize(&record);
        let influence = self.influence.estimate(&record);
        record
            .dimension_scores
            .entry(Dimension::Popularity)
            .or_insert(popularity);
        record
            .dimension_scores
            .entry(Dimension::AuthorInfluence)
            .or_insert(influence);

        let (composite, breakdown) = self.compute(&record)?;
        debug!(
            identity_key = %record.identity_key,
            composite,
            degraded = record.is_degraded(),
            "record scored"
        );
        record.set_composite(composite, breakdown)?;
        Ok(record)
    }

    /// Finalizes every record, stopping at the first invariant violation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScoreError`] encountered.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub fn score_all(
        &self,
        records: Vec<CanonicalRecord>,
    ) -> Result<Vec<CanonicalRecord>, ScoreError> {
        let scored = records
            .into_iter()
            .map(|record| self.finalize(record))
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = scored.len(), "scoring complete");
        Ok(scored)
    }

    fn dimension_value(
        &self,
        record: &CanonicalRecord,
        dimension: Dimension,
    ) -> Result<f64, ScoreError> {
        if let Some(&value) = record.dimension_scores.get(&dimension)
            && value.is_finite()
        {
            return Ok(value.clamp(0.0, 10.0));
        }
        match dimension {
            Dimension::Popularity => Ok(self.popularity.normalize(record)),
            Dimension::AuthorInfluence => Ok(self.influence.estimate(record)),
            _ => Err(ScoreError::MissingDimension {
                identity_key: record.identity_key.clone(),
                dimension,
            }),
        }
    }
}

/// Lower-cased alphanumeric tokens of `text`, in order.
pub(crate) fn text_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
