//! Duplicate collapsing across and within sources.
//!
//! Records sharing an `identity_key` are merged into the earliest-seen one.
//! The earlier record is the base: its populated fields win, its empty fields
//! are filled from the later duplicate, and list-like fields are unioned.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::record::CanonicalRecord;

/// Counters from one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// Records fed into the pass.
    pub input: usize,
    /// Duplicates folded into an earlier record.
    pub merged: usize,
    /// Merges where the two records disagreed on URL.
    pub url_conflicts: usize,
}

/// Surviving records keyed by `identity_key`, iterated in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DedupedRecords {
    records: Vec<CanonicalRecord>,
    index: HashMap<String, usize>,
}

impl DedupedRecords {
    /// Number of surviving records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up the surviving record for a key.
    #[must_use]
    pub fn get(&self, identity_key: &str) -> Option<&CanonicalRecord> {
        self.index.get(identity_key).map(|&slot| &self.records[slot])
    }

    /// Iterates `(identity_key, record)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CanonicalRecord)> {
        self.records
            .iter()
            .map(|record| (record.identity_key.as_str(), record))
    }

    /// Consumes the mapping, yielding records in first-seen order.
    #[must_use]
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

/// Collapses records with identical identity keys, preserving first-seen order.
///
/// Running this again on its own output performs no merges.
#[instrument(skip(records), fields(input = records.len()))]
pub fn deduplicate(records: Vec<CanonicalRecord>) -> (DedupedRecords, DedupStats) {
    let mut stats = DedupStats {
        input: records.len(),
        ..DedupStats::default()
    };
    let mut deduped = DedupedRecords::default();

    for record in records {
        if let Some(&slot) = deduped.index.get(&record.identity_key) {
            let base = &mut deduped.records[slot];
            if !base.url.eq_ignore_ascii_case(&record.url) {
                // Same key, different URL: trusted as the same work.
                debug!(
                    identity_key = %base.identity_key,
                    kept_url = %base.url,
                    dropped_url = %record.url,
                    "merging duplicates with conflicting URLs"
                );
                stats.url_conflicts += 1;
            }
            merge_into(base, record);
            stats.merged += 1;
        } else {
            deduped
                .index
                .insert(record.identity_key.clone(), deduped.records.len());
            deduped.records.push(record);
        }
    }

    info!(
        input = stats.input,
        surviving = deduped.len(),
        merged = stats.merged,
        url_conflicts = stats.url_conflicts,
        "deduplication complete"
    );
    (deduped, stats)
}

/// Fills empty fields on `base` from `later` and unions list-like fields.
fn merge_into(base: &mut CanonicalRecord, later: CanonicalRecord) {
    if base.description.is_empty() {
        base.description = later.description;
    }
    if base.published_at.is_none() {
        base.published_at = later.published_at;
    }
    if base.raw_popularity.is_none() {
        base.raw_popularity = later.raw_popularity;
    }
    if base.external_id.is_none() {
        base.external_id = later.external_id;
    }
    if base.language.is_none() {
        base.language = later.language;
    }
    if base.analysis.is_none() {
        base.analysis = later.analysis;
    }
    union_into(&mut base.authors, later.authors);
    union_into(&mut base.source_categories, later.source_categories);
    union_into(&mut base.category_tags, later.category_tags);
    for (dimension, score) in later.dimension_scores {
        base.dimension_scores.entry(dimension).or_insert(score);
    }
    base.provenance.extend(later.provenance);
}

fn union_into(base: &mut Vec<String>, later: Vec<String>) {
    for item in later {
        if !base.contains(&item) {
            base.push(item);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::record::{PopularityMetric, Source};

    fn record(source: Source, key: &str, url: &str) -> CanonicalRecord {
        CanonicalRecord::new(source, key, key, url)
    }

    #[test]
    fn test_distinct_keys_survive_in_first_seen_order() {
        let (deduped, stats) = deduplicate(vec![
            record(Source::Paper, "b", "https://b"),
            record(Source::Paper, "a", "https://a"),
        ]);
        let keys: Vec<&str> = deduped.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(stats.merged, 0);
    }

    #[test]
    fn test_later_duplicate_fills_empty_base_fields() {
        let base = record(Source::Paper, "k", "https://paper");
        let mut later = record(Source::Repository, "k", "https://paper");
        later.description = "from repo".to_string();
        later.raw_popularity = Some(PopularityMetric::Stars(90));
        later.published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        later.language = Some("Rust".to_string());

        let (deduped, stats) = deduplicate(vec![base, later]);
        let merged = deduped.get("k").unwrap();
        assert_eq!(deduped.len(), 1);
        assert_eq!(stats.merged, 1);
        assert_eq!(merged.source, Source::Paper);
        assert_eq!(merged.description, "from repo");
        assert_eq!(merged.raw_popularity, Some(PopularityMetric::Stars(90)));
        assert!(merged.published_at.is_some());
        assert_eq!(merged.language.as_deref(), Some("Rust"));
        assert!(merged.provenance.contains(&Source::Paper));
        assert!(merged.provenance.contains(&Source::Repository));
    }

    #[test]
    fn test_base_fields_win_when_populated() {
        let mut base = record(Source::Paper, "k", "https://a");
        base.description = "base".to_string();
        base.raw_popularity = Some(PopularityMetric::Citations(3));
        let mut later = record(Source::Paper, "k", "https://a");
        later.description = "later".to_string();
        later.raw_popularity = Some(PopularityMetric::Citations(99));

        let (deduped, _) = deduplicate(vec![base, later]);
        let merged = deduped.get("k").unwrap();
        assert_eq!(merged.description, "base");
        assert_eq!(merged.raw_popularity, Some(PopularityMetric::Citations(3)));
    }

    #[test]
    fn test_authors_and_tags_are_unioned_in_order() {
        let mut base = record(Source::Paper, "k", "https://a");
        base.authors = vec!["Ada".into(), "Grace".into()];
        base.category_tags = vec!["tool".into()];
        let mut later = record(Source::Paper, "k", "https://a");
        later.authors = vec!["Grace".into(), "Linus".into()];
        later.category_tags = vec!["benchmark".into(), "tool".into()];

        let (deduped, _) = deduplicate(vec![base, later]);
        let merged = deduped.get("k").unwrap();
        assert_eq!(merged.authors, vec!["Ada", "Grace", "Linus"]);
        assert_eq!(merged.category_tags, vec!["tool", "benchmark"]);
    }

    #[test]
    fn test_conflicting_urls_still_merge_and_are_counted() {
        let (deduped, stats) = deduplicate(vec![
            record(Source::Paper, "k", "https://one"),
            record(Source::Paper, "k", "https://two"),
        ]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.get("k").unwrap().url, "https://one");
        assert_eq!(stats.url_conflicts, 1);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let (first, _) = deduplicate(vec![
            record(Source::Paper, "a", "https://a"),
            record(Source::Repository, "a", "https://a2"),
            record(Source::Paper, "b", "https://b"),
        ]);
        let snapshot = first.clone().into_records();
        let (second, stats) = deduplicate(first.into_records());
        assert_eq!(stats.merged, 0);
        assert_eq!(second.into_records(), snapshot);
    }

    #[test]
    fn test_empty_input() {
        let (deduped, stats) = deduplicate(Vec::new());
        assert!(deduped.is_empty());
        assert_eq!(stats, DedupStats::default());
    }
}
