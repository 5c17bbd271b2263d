//! Quality dimensions that feed the composite score.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One independent quality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Source-native popularity (stars, citations), log-compressed.
    Popularity,
    TechnicalInnovation,
    ApplicationValue,
    Readability,
    ExperimentalThoroughness,
    /// Author / institution influence proxy.
    AuthorInfluence,
}

impl Dimension {
    /// Every dimension, in breakdown order.
    pub const ALL: [Dimension; 6] = [
        Self::Popularity,
        Self::TechnicalInnovation,
        Self::ApplicationValue,
        Self::Readability,
        Self::ExperimentalThoroughness,
        Self::AuthorInfluence,
    ];

    /// Dimensions the analysis oracle is expected to score.
    pub const ORACLE: [Dimension; 4] = [
        Self::TechnicalInnovation,
        Self::ApplicationValue,
        Self::Readability,
        Self::ExperimentalThoroughness,
    ];

    /// Stable snake_case name, matching the oracle's JSON keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Popularity => "popularity",
            Self::TechnicalInnovation => "technical_innovation",
            Self::ApplicationValue => "application_value",
            Self::Readability => "readability",
            Self::ExperimentalThoroughness => "experimental_thoroughness",
            Self::AuthorInfluence => "author_influence",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == name.trim())
            .ok_or_else(|| format!("unknown dimension `{name}`"))
    }
}
