//! Author / institution influence proxy.

use crate::record::{CanonicalRecord, PopularityMetric, Source};

use super::text_tokens;

const BASE_SCORE: f64 = 5.0;
const ORGANIZATION_BONUS: f64 = 2.0;
const STAR_BONUS_THRESHOLD: u64 = 1_000;

/// Organizations whose involvement signals a widely followed artifact.
#[must_use]
pub fn default_influential_organizations() -> Vec<String> {
    [
        "google", "microsoft", "meta", "openai", "anthropic", "deepmind", "stanford", "mit",
        "berkeley", "cmu", "harvard", "oxford", "cambridge", "nvidia", "huggingface",
        "salesforce", "adobe", "ibm", "amazon", "tsinghua", "peking", "tencent", "baidu",
        "alibaba",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Estimates influence from author lists, hosting URLs, and descriptions.
#[derive(Debug, Clone)]
pub struct InfluenceEstimator {
    organizations: Vec<String>,
}

impl Default for InfluenceEstimator {
    fn default() -> Self {
        Self::new(default_influential_organizations())
    }
}

impl InfluenceEstimator {
    #[must_use]
    pub fn new(organizations: Vec<String>) -> Self {
        Self {
            organizations: organizations
                .into_iter()
                .map(|org| org.trim().to_lowercase())
                .filter(|org| !org.is_empty())
                .collect(),
        }
    }

    /// Influence score in `[0, 10]`.
    ///
    /// Papers: +2 for an influential organization among the authors, +1 for
    /// five or more authors (+0.5 for three or more). Repositories: +2 for an
    /// influential organization in the URL or description, +1 for 1 000 stars.
    #[must_use]
    pub fn estimate(&self, record: &CanonicalRecord) -> f64 {
        let mut score = BASE_SCORE;
        match record.source {
            Source::Paper => {
                if self.mentions_organization(&record.authors.join(" ")) {
                    score += ORGANIZATION_BONUS;
                }
                score += match record.authors.len() {
                    n if n >= 5 => 1.0,
                    n if n >= 3 => 0.5,
                    _ => 0.0,
                };
            }
            Source::Repository => {
                let haystack = format!("{} {}", record.url, record.description);
                if self.mentions_organization(&haystack) {
                    score += ORGANIZATION_BONUS;
                }
                if let Some(PopularityMetric::Stars(stars)) = record.raw_popularity
                    && stars >= STAR_BONUS_THRESHOLD
                {
                    score += 1.0;
                }
            }
        }
        f64::min(score, 10.0)
    }

    fn mentions_organization(&self, text: &str) -> bool {
        let tokens = text_tokens(text);
        self.organizations.iter().any(|org| {
            let org_tokens = text_tokens(org);
            !org_tokens.is_empty()
                && tokens
                    .windows(org_tokens.len())
                    .any(|window| window == org_tokens.as_slice())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(authors: &[&str]) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(Source::Paper, "k", "T", "https://arxiv.org/abs/1");
        record.authors = authors.iter().map(ToString::to_string).collect();
        record
    }

    #[test]
    fn test_paper_base_score() {
        let estimator = InfluenceEstimator::default();
        assert!((estimator.estimate(&paper(&["Ada"])) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_paper_author_count_bonus() {
        let estimator = InfluenceEstimator::default();
        assert!((estimator.estimate(&paper(&["A", "B", "C"])) - 5.5).abs() < 1e-9);
        assert!((estimator.estimate(&paper(&["A", "B", "C", "D", "E"])) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_paper_organization_bonus_is_whole_word() {
        let estimator = InfluenceEstimator::default();
        assert!((estimator.estimate(&paper(&["Jane Doe (Google DeepMind)"])) - 7.0).abs() < 1e-9);
        // "Smith" must not match "mit".
        assert!((estimator.estimate(&paper(&["John Smith"])) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_repository_url_and_stars_bonus() {
        let estimator = InfluenceEstimator::default();
        let mut repo = CanonicalRecord::new(
            Source::Repository,
            "k",
            "T",
            "https://github.com/microsoft/thing",
        );
        repo.raw_popularity = Some(PopularityMetric::Stars(1_500));
        assert!((estimator.estimate(&repo) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_multiword_organization() {
        let estimator = InfluenceEstimator::new(vec!["Allen Institute".to_string()]);
        assert!((estimator.estimate(&paper(&["X (Allen Institute for AI)"])) - 7.0).abs() < 1e-9);
    }
}
