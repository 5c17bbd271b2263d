//! Research Digest Core Library
//!
//! This library turns a noisy, duplicate-laden stream of research artifacts
//! (arXiv-style papers and code repositories) into a small, ranked,
//! category-balanced digest with deterministic, explainable ordering.
//!
//! # Architecture
//!
//! Data flows strictly left to right through the following modules:
//! - [`normalize`] - Raw source payloads into [`CanonicalRecord`]s
//! - [`dedup`] - Collapse records that refer to the same work
//! - [`analysis`] - Analysis oracle invocation, response validation, retries
//! - [`scoring`] - Weighted composite score across quality dimensions
//! - [`select`] - Global and per-category budgets, final ranking
//!
//! [`pipeline`] wires the stages together for a single batch run and
//! [`config`] holds the validated run configuration.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod config;
pub mod dedup;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod scoring;
pub mod select;

// Re-export commonly used types
pub use analysis::{
    AnalysisEngine, AnalysisOracle, AnalysisStats, ChatCompletionsOracle, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_ATTEMPTS, OfflineOracle, OracleError, OracleRequest, RetryPolicy,
};
pub use config::{ConfigError, DigestConfig, LoadedConfig, SelectionBudget, load_config};
pub use dedup::{DedupStats, DedupedRecords, deduplicate};
pub use normalize::{NormalizeError, RawPayload, normalize};
pub use pipeline::{Pipeline, PipelineError, RunOutput, RunReport};
pub use record::{Analysis, AnalysisStatus, CanonicalRecord, OTHER_TAG, PopularityMetric, Source};
pub use scoring::{CompositeScorer, Dimension, ScoreBreakdown, ScoreError, ScoringWeights};
pub use select::{Digest, DigestEntry, DigestSection, SelectionStop, SkipReason, select};
