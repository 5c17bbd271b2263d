//! Validated, immutable dimension weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Dimension;

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Violations of the weights invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    /// A weight is negative, NaN, or infinite.
    #[error("weight for {dimension} must be a finite non-negative number, got {weight}")]
    InvalidWeight {
        /// The offending dimension.
        dimension: Dimension,
        /// The rejected value.
        weight: f64,
    },

    /// A configured name is not a known dimension.
    #[error("unknown scoring dimension `{name}`")]
    UnknownDimension {
        /// The unrecognized key.
        name: String,
    },

    /// Weights do not sum to 1.0.
    #[error("weights must sum to 1.0 (±{WEIGHT_SUM_TOLERANCE}), got {sum}")]
    BadSum {
        /// The actual sum.
        sum: f64,
    },
}

/// Fractional weight per dimension, summing to 1.0.
///
/// Dimensions without an entry carry zero weight. Construction is the only
/// validation point: once built, weights are never re-checked per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ScoringWeights {
    weights: BTreeMap<Dimension, f64>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (Dimension::Popularity, 0.25),
                (Dimension::TechnicalInnovation, 0.20),
                (Dimension::ApplicationValue, 0.10),
                (Dimension::Readability, 0.15),
                (Dimension::ExperimentalThoroughness, 0.15),
                (Dimension::AuthorInfluence, 0.15),
            ]),
        }
    }
}

impl TryFrom<BTreeMap<String, f64>> for ScoringWeights {
    type Error = WeightsError;

    fn try_from(named: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let weights = named
            .into_iter()
            .map(|(name, weight)| {
                name.parse::<Dimension>()
                    .map(|dimension| (dimension, weight))
                    .map_err(|_| WeightsError::UnknownDimension { name })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Self::new(weights)
    }
}

impl From<ScoringWeights> for BTreeMap<String, f64> {
    fn from(weights: ScoringWeights) -> Self {
        weights
            .weights
            .into_iter()
            .map(|(dimension, weight)| (dimension.as_str().to_string(), weight))
            .collect()
    }
}

impl From<ScoringWeights> for BTreeMap<Dimension, f64> {
    fn from(weights: ScoringWeights) -> Self {
        weights.weights
    }
}

impl ScoringWeights {
    /// Validates and wraps a weight table.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError`] if any weight is negative or non-finite, or the
    /// weights do not sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
    pub fn new(weights: BTreeMap<Dimension, f64>) -> Result<Self, WeightsError> {
        for (&dimension, &weight) in &weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(WeightsError::InvalidWeight { dimension, weight });
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::BadSum { sum });
        }
        Ok(Self { weights })
    }

    /// Weight for a dimension (zero when not configured).
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Iterates configured `(dimension, weight)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.weights.iter().map(|(&dimension, &weight)| (dimension, weight))
    }

    /// Returns new weights with `dimension` set to `weight` and every other
    /// weight rescaled proportionally so the total stays 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError`] if `weight` is outside `[0, 1]` or the other
    /// weights are all zero and cannot absorb the change.
    pub fn with_adjusted(&self, dimension: Dimension, weight: f64) -> Result<Self, WeightsError> {
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(WeightsError::InvalidWeight { dimension, weight });
        }
        let others: f64 = self
            .iter()
            .filter(|&(d, _)| d != dimension)
            .map(|(_, w)| w)
            .sum();
        let remaining = 1.0 - weight;
        if others <= 0.0 && remaining > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::BadSum { sum: weight });
        }
        let scale = if others > 0.0 { remaining / others } else { 0.0 };
        let mut adjusted: BTreeMap<Dimension, f64> = self
            .iter()
            .filter(|&(d, _)| d != dimension)
            .map(|(d, w)| (d, w * scale))
            .collect();
        adjusted.insert(dimension, weight);
        Self::new(adjusted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        let weights = ScoringWeights::default();
        let rebuilt = ScoringWeights::new(weights.clone().into()).unwrap();
        assert_eq!(rebuilt, weights);
        assert!((weights.get(Dimension::Popularity) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bad_sum_rejected() {
        let err = ScoringWeights::new(BTreeMap::from([
            (Dimension::Popularity, 0.5),
            (Dimension::Readability, 0.4),
        ]))
        .unwrap_err();
        assert!(matches!(err, WeightsError::BadSum { .. }));
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = ScoringWeights::new(BTreeMap::from([
            (Dimension::Popularity, 1.5),
            (Dimension::Readability, -0.5),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            WeightsError::InvalidWeight {
                dimension: Dimension::Readability,
                ..
            }
        ));
    }

    #[test]
    fn test_nan_weight_rejected() {
        let err =
            ScoringWeights::new(BTreeMap::from([(Dimension::Popularity, f64::NAN)])).unwrap_err();
        assert!(matches!(err, WeightsError::InvalidWeight { .. }));
    }

    #[test]
    fn test_sum_within_tolerance_accepted() {
        let weights = ScoringWeights::new(BTreeMap::from([
            (Dimension::Popularity, 0.1 + 0.2),
            (Dimension::Readability, 0.7),
        ]));
        assert!(weights.is_ok());
    }

    #[test]
    fn test_unconfigured_dimension_weighs_zero() {
        let weights =
            ScoringWeights::new(BTreeMap::from([(Dimension::Readability, 1.0)])).unwrap();
        assert!(weights.get(Dimension::Popularity).abs() < f64::EPSILON);
    }

    #[test]
    fn test_with_adjusted_keeps_sum_and_proportions() {
        let weights = ScoringWeights::default()
            .with_adjusted(Dimension::Readability, 0.5)
            .unwrap();
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        let ratio = weights.get(Dimension::Popularity) / weights.get(Dimension::ApplicationValue);
        assert!((ratio - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_validates() {
        let err = toml::from_str::<ScoringWeights>("popularity = 0.9\n").unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));

        let err = toml::from_str::<ScoringWeights>("novelty = 1.0\n").unwrap_err();
        assert!(err.to_string().contains("unknown scoring dimension"));

        let ok: ScoringWeights =
            toml::from_str("popularity = 0.5\nreadability = 0.5\n").unwrap();
        assert!((ok.get(Dimension::Readability) - 0.5).abs() < f64::EPSILON);
    }
}
