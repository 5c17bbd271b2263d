//! Validation of untrusted oracle replies.
//!
//! The oracle's JSON is never used directly. Every expected field is read
//! through [`validate`], which records a [`FieldOutcome`] per field and
//! substitutes safe values where the reply is missing, mistyped, or out of
//! range. Validation never fails: the worst reply yields an all-default
//! [`AnalysisOutcome`] with [`AnalysisStatus::Partial`].

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::record::{Analysis, AnalysisStatus, CanonicalRecord};
use crate::scoring::Dimension;

use super::fallback::{estimate_relevance, fallback_tags};

/// Score substituted for a missing dimension.
pub const MIDPOINT_SCORE: f64 = 5.0;

/// Most category tags kept per record.
pub const MAX_CATEGORY_TAGS: usize = 3;

const SCORE_RANGE: RangeInclusive<f64> = 1.0..=10.0;

const PLACEHOLDER_TEXT: &str = "Not provided";

/// How one reply field was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// Present, well-typed, and in range.
    Valid,
    /// Usable after a fix-up (clamped, coerced, wrapped, truncated).
    Repaired { detail: String },
    /// Missing or unusable; a default was substituted.
    Defaulted { reason: String },
    /// Part of the value was discarded (e.g. tags outside the vocabulary).
    Rejected { detail: String },
}

impl FieldOutcome {
    #[must_use]
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted { .. })
    }
}

/// Outcome for one named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub field: String,
    #[serde(flatten)]
    pub outcome: FieldOutcome,
}

/// Validated analysis ready to be applied to its record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub category_tags: Vec<String>,
    /// One entry per oracle dimension, always in `[1, 10]`.
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub fields: Vec<FieldReport>,
}

impl AnalysisOutcome {
    /// Outcome recorded for `field`, if it was inspected.
    #[must_use]
    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.fields
            .iter()
            .find(|report| report.field == field)
            .map(|report| &report.outcome)
    }

    /// Writes tags, oracle dimension scores, and the qualitative analysis onto `record`.
    pub fn apply_to(self, record: &mut CanonicalRecord) {
        for tag in self.category_tags {
            record.add_category_tag(tag);
        }
        record.dimension_scores.extend(self.dimension_scores);
        record.analysis = Some(self.analysis);
    }
}

/// Validates an oracle reply for `record` against the closed tag `vocabulary`.
#[must_use]
pub fn validate(reply: &Value, record: &CanonicalRecord, vocabulary: &[String]) -> AnalysisOutcome {
    let mut validator = Validator::default();

    let scores = reply.get("scoring_dimensions");
    let dimension_scores: BTreeMap<Dimension, f64> = Dimension::ORACLE
        .into_iter()
        .map(|dimension| {
            let value = scores.and_then(|scores| scores.get(dimension.as_str()));
            (
                dimension,
                validator.score(dimension.as_str(), value, MIDPOINT_SCORE),
            )
        })
        .collect();

    let relevance_default = estimate_relevance(&record.title, &record.description);
    let relevance_score =
        validator.score("relevance_score", reply.get("relevance_score"), relevance_default);
    let background = validator.text("background", field(reply, &["background"]));
    let audience = validator.text("audience", field(reply, &["audience", "target_audience"]));
    let summary = validator.text("summary", field(reply, &["summary"]));
    let technical_highlights =
        validator.list("technical_highlights", field(reply, &["technical_highlights"]));
    let applications = validator.list(
        "applications",
        field(reply, &["applications", "potential_applications"]),
    );
    let category_tags = validator.tags(reply.get("category_tags"), record, vocabulary);

    let defaulted: Vec<&str> = Dimension::ORACLE
        .into_iter()
        .map(Dimension::as_str)
        .filter(|name| {
            validator
                .outcome(name)
                .is_some_and(FieldOutcome::is_defaulted)
        })
        .collect();
    let (status, degraded_reason) = if defaulted.is_empty() {
        (AnalysisStatus::Complete, None)
    } else {
        (
            AnalysisStatus::Partial,
            Some(format!("defaulted dimensions: {}", defaulted.join(", "))),
        )
    };

    debug!(
        identity_key = %record.identity_key,
        ?status,
        tags = ?category_tags,
        "oracle reply validated"
    );

    AnalysisOutcome {
        analysis: Analysis {
            background,
            technical_highlights,
            applications,
            audience,
            summary,
            relevance_score,
            status,
            degraded_reason,
        },
        category_tags,
        dimension_scores,
        fields: validator.fields,
    }
}

/// Lower-cases and joins words with underscores: `"Code Repair"` -> `"code_repair"`.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// First present, non-null value among `keys`.
fn field<'a>(reply: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| reply.get(key))
        .find(|value| !value.is_null())
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "missing".to_string(),
        Some(Value::Bool(_)) => "expected a number or string, got a boolean".to_string(),
        Some(Value::Number(_)) => "expected a string, got a number".to_string(),
        Some(Value::String(_)) => "unusable string".to_string(),
        Some(Value::Array(_)) => "unexpected array".to_string(),
        Some(Value::Object(_)) => "unexpected object".to_string(),
    }
}

#[derive(Debug, Default)]
struct Validator {
    fields: Vec<FieldReport>,
}

impl Validator {
    fn record(&mut self, field: &str, outcome: FieldOutcome) {
        self.fields.push(FieldReport {
            field: field.to_string(),
            outcome,
        });
    }

    fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.fields
            .iter()
            .find(|report| report.field == field)
            .map(|report| &report.outcome)
    }

    fn score(&mut self, field: &str, value: Option<&Value>, default: f64) -> f64 {
        let parsed = match value {
            Some(Value::Number(number)) => number.as_f64().map(|raw| (raw, None)),
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|raw| raw.is_finite())
                .map(|raw| (raw, Some(format!("coerced string {text:?}")))),
            _ => None,
        };
        let Some((raw, coerced)) = parsed else {
            self.record(
                field,
                FieldOutcome::Defaulted {
                    reason: describe(value),
                },
            );
            return default;
        };

        if !SCORE_RANGE.contains(&raw) {
            let clamped = raw.clamp(*SCORE_RANGE.start(), *SCORE_RANGE.end());
            warn!(field, raw, clamped, "oracle score out of range, clamped");
            self.record(
                field,
                FieldOutcome::Repaired {
                    detail: format!("clamped {raw} to {clamped}"),
                },
            );
            return clamped;
        }
        match coerced {
            Some(detail) => self.record(field, FieldOutcome::Repaired { detail }),
            None => self.record(field, FieldOutcome::Valid),
        }
        raw
    }

    fn text(&mut self, field: &str, value: Option<&Value>) -> String {
        match value {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                self.record(field, FieldOutcome::Valid);
                text.trim().to_string()
            }
            other => {
                self.record(
                    field,
                    FieldOutcome::Defaulted {
                        reason: describe(other),
                    },
                );
                PLACEHOLDER_TEXT.to_string()
            }
        }
    }

    fn list(&mut self, field: &str, value: Option<&Value>) -> Vec<String> {
        match value {
            Some(Value::Array(items)) => {
                let kept: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect();
                let dropped = items.len() - kept.len();
                if dropped == 0 {
                    self.record(field, FieldOutcome::Valid);
                } else {
                    self.record(
                        field,
                        FieldOutcome::Repaired {
                            detail: format!("dropped {dropped} unusable items"),
                        },
                    );
                }
                kept
            }
            Some(Value::String(text)) if !text.trim().is_empty() => {
                self.record(
                    field,
                    FieldOutcome::Repaired {
                        detail: "wrapped scalar in a list".to_string(),
                    },
                );
                vec![text.trim().to_string()]
            }
            other => {
                self.record(
                    field,
                    FieldOutcome::Defaulted {
                        reason: describe(other),
                    },
                );
                Vec::new()
            }
        }
    }

    fn tags(
        &mut self,
        value: Option<&Value>,
        record: &CanonicalRecord,
        vocabulary: &[String],
    ) -> Vec<String> {
        const FIELD: &str = "category_tags";

        let (raw, wrapped): (Vec<&str>, bool) = match value {
            Some(Value::Array(items)) => (items.iter().filter_map(Value::as_str).collect(), false),
            Some(Value::String(text)) => (vec![text.as_str()], true),
            _ => (Vec::new(), false),
        };

        let mut accepted: Vec<String> = Vec::new();
        let mut rejected: Vec<String> = Vec::new();
        let mut renamed = false;
        for tag in raw {
            let normalized = normalize_tag(tag);
            renamed |= normalized != tag;
            if normalized.is_empty() || !vocabulary.contains(&normalized) {
                rejected.push(tag.to_string());
            } else if !accepted.contains(&normalized) {
                accepted.push(normalized);
            }
        }
        let truncated = accepted.len() > MAX_CATEGORY_TAGS;
        accepted.truncate(MAX_CATEGORY_TAGS);

        if accepted.is_empty() {
            let reason = if rejected.is_empty() {
                describe(value)
            } else {
                format!("no tag in vocabulary: {}", rejected.join(", "))
            };
            self.record(FIELD, FieldOutcome::Defaulted { reason });
            return fallback_tags(record, vocabulary);
        }

        if !rejected.is_empty() {
            debug!(rejected = ?rejected, "discarding unknown category tags");
            self.record(
                FIELD,
                FieldOutcome::Rejected {
                    detail: format!("discarded unknown tags: {}", rejected.join(", ")),
                },
            );
        } else if truncated || renamed || wrapped {
            self.record(
                FIELD,
                FieldOutcome::Repaired {
                    detail: "tags normalized or truncated".to_string(),
                },
            );
        } else {
            self.record(FIELD, FieldOutcome::Valid);
        }
        accepted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::analysis::fallback::default_category_tags;
    use crate::record::Source;

    fn record() -> CanonicalRecord {
        CanonicalRecord::new(Source::Paper, "k", "A benchmark for LLMs", "https://a.org")
    }

    fn complete_reply() -> Value {
        json!({
            "background": "Context.",
            "technical_highlights": ["one", "two"],
            "applications": ["IDEs"],
            "audience": "Researchers",
            "category_tags": ["benchmark", "llm_coding"],
            "relevance_score": 8,
            "summary": "Short.",
            "scoring_dimensions": {
                "technical_innovation": 7,
                "application_value": 6.5,
                "readability": 8,
                "experimental_thoroughness": 9
            }
        })
    }

    #[test]
    fn test_complete_reply_is_valid() {
        let outcome = validate(&complete_reply(), &record(), &default_category_tags());
        assert_eq!(outcome.analysis.status, AnalysisStatus::Complete);
        assert!(outcome.analysis.degraded_reason.is_none());
        assert_eq!(outcome.category_tags, vec!["benchmark", "llm_coding"]);
        assert!((outcome.dimension_scores[&Dimension::ApplicationValue] - 6.5).abs() < 1e-9);
        assert!(
            outcome
                .fields
                .iter()
                .all(|report| report.outcome == FieldOutcome::Valid)
        );
    }

    #[test]
    fn test_out_of_range_score_is_clamped() {
        let mut reply = complete_reply();
        reply["scoring_dimensions"]["readability"] = json!(14);
        reply["scoring_dimensions"]["technical_innovation"] = json!(-3);
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert!((outcome.dimension_scores[&Dimension::Readability] - 10.0).abs() < 1e-9);
        assert!((outcome.dimension_scores[&Dimension::TechnicalInnovation] - 1.0).abs() < 1e-9);
        assert!(matches!(
            outcome.outcome("readability"),
            Some(FieldOutcome::Repaired { .. })
        ));
        assert_eq!(outcome.analysis.status, AnalysisStatus::Complete);
    }

    #[test]
    fn test_numeric_string_is_coerced() {
        let mut reply = complete_reply();
        reply["scoring_dimensions"]["readability"] = json!(" 7.5 ");
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert!((outcome.dimension_scores[&Dimension::Readability] - 7.5).abs() < 1e-9);
        assert!(matches!(
            outcome.outcome("readability"),
            Some(FieldOutcome::Repaired { .. })
        ));
    }

    #[test]
    fn test_missing_dimension_defaults_to_midpoint_and_is_partial() {
        let mut reply = complete_reply();
        reply["scoring_dimensions"]
            .as_object_mut()
            .unwrap()
            .remove("experimental_thoroughness");
        reply["scoring_dimensions"]["readability"] = json!("high");
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert!(
            (outcome.dimension_scores[&Dimension::ExperimentalThoroughness] - MIDPOINT_SCORE)
                .abs()
                < 1e-9
        );
        assert!((outcome.dimension_scores[&Dimension::Readability] - MIDPOINT_SCORE).abs() < 1e-9);
        assert_eq!(outcome.analysis.status, AnalysisStatus::Partial);
        let reason = outcome.analysis.degraded_reason.unwrap();
        assert!(reason.contains("readability"));
        assert!(reason.contains("experimental_thoroughness"));
    }

    #[test]
    fn test_tags_are_normalized_filtered_and_truncated() {
        let mut reply = complete_reply();
        reply["category_tags"] = json!([
            "Code Repair",
            "benchmark",
            "quantum-gravity",
            "llm-coding",
            "benchmark",
            "survey"
        ]);
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert_eq!(
            outcome.category_tags,
            vec!["code_repair", "benchmark", "llm_coding"]
        );
        assert!(matches!(
            outcome.outcome("category_tags"),
            Some(FieldOutcome::Rejected { .. })
        ));
    }

    #[test]
    fn test_no_usable_tags_falls_back_to_keywords() {
        let mut reply = complete_reply();
        reply["category_tags"] = json!(["astrology"]);
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert_eq!(outcome.category_tags, vec!["llm_coding", "benchmark"]);
        assert!(matches!(
            outcome.outcome("category_tags"),
            Some(FieldOutcome::Defaulted { .. })
        ));
    }

    #[test]
    fn test_scalar_list_is_wrapped_and_aliases_are_read() {
        let mut reply = complete_reply();
        let object = reply.as_object_mut().unwrap();
        object.remove("applications");
        object.remove("audience");
        object.insert("potential_applications".into(), json!("Code review"));
        object.insert("target_audience".into(), json!("Engineers"));
        let outcome = validate(&reply, &record(), &default_category_tags());
        assert_eq!(outcome.analysis.applications, vec!["Code review"]);
        assert_eq!(outcome.analysis.audience, "Engineers");
    }

    #[test]
    fn test_non_object_reply_is_fully_defaulted() {
        let outcome = validate(&Value::Null, &record(), &default_category_tags());
        assert_eq!(outcome.analysis.status, AnalysisStatus::Partial);
        assert_eq!(outcome.analysis.summary, PLACEHOLDER_TEXT);
        assert!(outcome.analysis.technical_highlights.is_empty());
        for dimension in Dimension::ORACLE {
            assert!((outcome.dimension_scores[&dimension] - MIDPOINT_SCORE).abs() < 1e-9);
        }
        assert!(!outcome.category_tags.is_empty());
    }

    #[test]
    fn test_apply_to_writes_record_fields() {
        let mut target = record();
        validate(&complete_reply(), &target.clone(), &default_category_tags())
            .apply_to(&mut target);
        assert_eq!(target.category_tags, vec!["benchmark", "llm_coding"]);
        assert_eq!(target.dimension_scores.len(), Dimension::ORACLE.len());
        assert!(!target.is_degraded());
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Code  Repair "), "code_repair");
        assert_eq!(normalize_tag("LLM-Coding"), "llm_coding");
        assert_eq!(normalize_tag("---"), "");
    }
}
