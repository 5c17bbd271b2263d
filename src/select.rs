//! Final ranking under global and per-category budgets.
//!
//! Records are ordered by composite score (descending), then publication
//! date (newest first, undated last), then identity key. The walk accepts a
//! record while the global budget allows and at least one of its categories
//! still has room; an accepted record counts against every category it
//! carries.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::SelectionBudget;
use crate::record::{CanonicalRecord, OTHER_TAG, Source};

/// Why the selector stopped walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStop {
    /// `max_total_items` was reached with records still unconsidered.
    BudgetExhausted,
    /// Every record was considered.
    InputExhausted,
}

/// Why a record was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every category the record carries was already at its cap.
    CategoryFull,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub identity_key: String,
    pub reason: SkipReason,
}

/// One selected record with its global rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestEntry {
    /// 1-based position in global order.
    pub rank: usize,
    /// First category tag, or `other` for untagged records.
    pub primary_category: String,
    pub record: CanonicalRecord,
}

impl DigestEntry {
    /// Composite score, `0.0` for a record that was never scored.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.record.composite_score().unwrap_or(0.0)
    }
}

/// Entries sharing a primary category, referenced by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestSection {
    pub category: String,
    /// Ranks of the entries in this section, ascending.
    pub ranks: Vec<usize>,
}

/// The ranked, categorized output set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub ranked: Vec<DigestEntry>,
    /// Ordered by each section's best-ranked entry.
    pub sections: Vec<DigestSection>,
    pub source_counts: BTreeMap<Source, usize>,
    /// Accepted records per category; a multi-tagged record counts once in each.
    pub category_counts: BTreeMap<String, usize>,
    pub stop: SelectionStop,
    pub skipped: Vec<SkippedRecord>,
}

impl Digest {
    /// Number of selected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Looks up an entry by its 1-based rank.
    #[must_use]
    pub fn entry(&self, rank: usize) -> Option<&DigestEntry> {
        rank.checked_sub(1).and_then(|index| self.ranked.get(index))
    }

    /// Entries of one section in rank order.
    pub fn section_entries<'a>(
        &'a self,
        section: &'a DigestSection,
    ) -> impl Iterator<Item = &'a DigestEntry> + 'a {
        section.ranks.iter().filter_map(|rank| self.entry(*rank))
    }
}

/// Global ordering used by the selector.
///
/// Scores compare with `total_cmp`, so the order is total even for NaN.
#[must_use]
pub fn rank_order(a: &CanonicalRecord, b: &CanonicalRecord) -> Ordering {
    let score_a = a.composite_score().unwrap_or(0.0);
    let score_b = b.composite_score().unwrap_or(0.0);
    score_b
        .total_cmp(&score_a)
        .then_with(|| match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.identity_key.cmp(&b.identity_key))
}

fn categories_of(record: &CanonicalRecord) -> Vec<String> {
    if record.category_tags.is_empty() {
        vec![OTHER_TAG.to_string()]
    } else {
        record.category_tags.clone()
    }
}

/// Selects the digest from scored records.
#[instrument(skip_all, fields(records = records.len(), max_total = budget.max_total_items))]
#[must_use]
pub fn select(mut records: Vec<CanonicalRecord>, budget: &SelectionBudget) -> Digest {
    records.sort_by(rank_order);

    let mut ranked: Vec<DigestEntry> =
        Vec::with_capacity(budget.max_total_items.min(records.len()));
    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut source_counts: BTreeMap<Source, usize> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut stop = SelectionStop::InputExhausted;

    for record in records {
        if ranked.len() >= budget.max_total_items {
            stop = SelectionStop::BudgetExhausted;
            break;
        }

        let categories = categories_of(&record);
        let has_room = categories.iter().any(|category| {
            category_counts.get(category).copied().unwrap_or(0) < budget.max_items_per_category
        });
        if !has_room {
            debug!(
                key = %record.identity_key,
                categories = ?categories,
                "skipped: categories full"
            );
            skipped.push(SkippedRecord {
                identity_key: record.identity_key,
                reason: SkipReason::CategoryFull,
            });
            continue;
        }

        for category in &categories {
            *category_counts.entry(category.clone()).or_insert(0) += 1;
        }
        *source_counts.entry(record.source).or_insert(0) += 1;

        let rank = ranked.len() + 1;
        debug!(rank, key = %record.identity_key, score = ?record.composite_score(), "selected");
        ranked.push(DigestEntry {
            rank,
            primary_category: categories[0].clone(),
            record,
        });
    }

    let sections = build_sections(&ranked);
    info!(
        selected = ranked.len(),
        skipped = skipped.len(),
        sections = sections.len(),
        stop = ?stop,
        "selection complete"
    );

    Digest {
        ranked,
        sections,
        source_counts,
        category_counts,
        stop,
        skipped,
    }
}

fn build_sections(ranked: &[DigestEntry]) -> Vec<DigestSection> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sections: Vec<DigestSection> = Vec::new();
    for entry in ranked {
        let position = *index
            .entry(entry.primary_category.as_str())
            .or_insert_with(|| {
                sections.push(DigestSection {
                    category: entry.primary_category.clone(),
                    ranks: Vec::new(),
                });
                sections.len() - 1
            });
        sections[position].ranks.push(entry.rank);
    }
    sections
}
