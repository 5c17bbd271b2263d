//! Popularity normalization across incompatible source metrics.
//!
//! Stars and citations live on very different scales. Each unit is mapped
//! onto `[floor, 10]` by its own [`PopularityScale`] so one enormous
//! source-native number cannot dominate the composite.

use std::fmt;

use crate::record::{CanonicalRecord, PopularityMetric, Source};

use super::text_tokens;

/// Maps a raw source-native count onto the common `[0, 10]` scale.
pub trait PopularityScale: fmt::Debug + Send + Sync {
    /// Normalized score for a raw count. Must be monotonic non-decreasing.
    fn normalize(&self, value: u64) -> f64;

    /// Score used when the source reports no metric at all.
    fn floor(&self) -> f64;
}

/// Logarithmic compression capped at a unit-specific ceiling.
///
/// `floor + (10 - floor) * ln(1 + v) / ln(1 + ceiling)`, capped at 10.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    floor: f64,
    ceiling: u64,
}

impl LogScale {
    /// Star counts: 10 000 stars saturate the scale.
    pub const STARS: Self = Self {
        floor: 3.0,
        ceiling: 10_000,
    };

    /// Citation counts: 1 000 citations saturate the scale.
    pub const CITATIONS: Self = Self {
        floor: 3.0,
        ceiling: 1_000,
    };
}

impl PopularityScale for LogScale {
    #[allow(clippy::cast_precision_loss)]
    fn normalize(&self, value: u64) -> f64 {
        let fraction = (1.0 + value as f64).ln() / (1.0 + self.ceiling as f64).ln();
        (self.floor + (10.0 - self.floor) * fraction).min(10.0)
    }

    fn floor(&self) -> f64 {
        self.floor
    }
}

/// Per-source popularity normalization behind one entry point.
#[derive(Debug)]
pub struct PopularityNormalizer {
    stars: Box<dyn PopularityScale>,
    citations: Box<dyn PopularityScale>,
    /// Lower-cased venue names that boost a paper without a citation metric.
    top_venues: Vec<String>,
}

impl Default for PopularityNormalizer {
    fn default() -> Self {
        Self::new(default_top_venues())
    }
}

/// Venues whose mention suggests a peer-reviewed, widely read paper.
#[must_use]
pub fn default_top_venues() -> Vec<String> {
    [
        "icml", "neurips", "iclr", "aaai", "ijcai", "acl", "emnlp", "naacl", "cvpr", "iccv",
        "eccv", "kdd", "www", "sigir", "wsdm", "icse", "fse",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl PopularityNormalizer {
    /// Uses the default log scales with the given venue list.
    #[must_use]
    pub fn new(top_venues: Vec<String>) -> Self {
        Self::with_scales(
            Box::new(LogScale::STARS),
            Box::new(LogScale::CITATIONS),
            top_venues,
        )
    }

    /// Full control over the per-unit scales.
    #[must_use]
    pub fn with_scales(
        stars: Box<dyn PopularityScale>,
        citations: Box<dyn PopularityScale>,
        top_venues: Vec<String>,
    ) -> Self {
        Self {
            stars,
            citations,
            top_venues: top_venues.into_iter().map(|v| v.to_lowercase()).collect(),
        }
    }

    /// Popularity score in `[0, 10]` for a record.
    #[must_use]
    pub fn normalize(&self, record: &CanonicalRecord) -> f64 {
        match record.raw_popularity {
            Some(PopularityMetric::Stars(stars)) => self.stars.normalize(stars),
            Some(PopularityMetric::Citations(citations)) => self.citations.normalize(citations),
            None => match record.source {
                Source::Paper => self.venue_heuristic(record),
                Source::Repository => self.stars.floor(),
            },
        }
    }

    /// Estimate for papers that carry no citation metric.
    ///
    /// Starts at 5, +2 for a top-venue mention, +1 for a core ML category.
    fn venue_heuristic(&self, record: &CanonicalRecord) -> f64 {
        let tokens = text_tokens(&format!("{} {}", record.title, record.description));
        let mut score = 5.0;
        if self.top_venues.iter().any(|venue| tokens.contains(venue)) {
            score += 2.0;
        }
        if record
            .source_categories
            .iter()
            .any(|category| category == "cs.AI" || category == "cs.LG")
        {
            score += 1.0;
        }
        f64::min(score, 10.0)
    }
}
