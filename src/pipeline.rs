//! Single-run orchestration: normalize, deduplicate, analyze, score, select.
//!
//! Analysis is a barrier: every record is collected back from the engine
//! before any record is scored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::analysis::{AnalysisEngine, AnalysisOracle, AnalysisStats, EngineError};
use crate::config::{ConfigError, DigestConfig};
use crate::dedup::{DedupStats, deduplicate};
use crate::normalize::{RawPayload, normalize};
use crate::scoring::{CompositeScorer, InfluenceEstimator, PopularityNormalizer, ScoreError};
use crate::select::{Digest, select};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected before the run started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scoring invariant was violated.
    #[error(transparent)]
    Score(#[from] ScoreError),
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidConcurrency { value } => {
                Self::Config(ConfigError::InvalidConcurrency { value })
            }
        }
    }
}

/// Counters and annotations for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Payloads received.
    pub payloads: usize,
    /// Payloads turned into records.
    pub normalized: usize,
    /// Payloads dropped as malformed.
    pub dropped_malformed: usize,
    pub dedup: DedupStats,
    pub analysis: AnalysisStats,
    /// The run deadline passed before analysis finished.
    pub deadline_exceeded: bool,
    /// Identity keys of records whose analysis is partial or unavailable.
    pub degraded_keys: Vec<String>,
    pub selected: usize,
}

/// Digest plus report, as written for the delivery layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub generated_at: DateTime<Utc>,
    pub report: RunReport,
    pub digest: Digest,
}

/// The configured pipeline for one batch run.
#[derive(Debug)]
pub struct Pipeline {
    config: DigestConfig,
    engine: AnalysisEngine,
    scorer: CompositeScorer,
}

impl Pipeline {
    /// Validates `config` and wires the stages around `oracle`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for any invalid configuration value.
    pub fn new(
        config: DigestConfig,
        oracle: Arc<dyn AnalysisOracle>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let engine = AnalysisEngine::new(
            oracle,
            config.oracle.concurrency,
            config.oracle.retry_policy(),
            config.oracle.call_timeout(),
        )?
        .with_vocabulary(config.vocabulary.category_tags.clone());

        let scorer = CompositeScorer::with_estimators(
            Arc::new(config.weights.clone()),
            PopularityNormalizer::new(config.vocabulary.top_venues.clone()),
            InfluenceEstimator::new(config.vocabulary.influential_organizations.clone()),
        );

        Ok(Self {
            config,
            engine,
            scorer,
        })
    }

    /// Runs every stage over `payloads`.
    ///
    /// Malformed payloads and oracle failures never fail the run; they are
    /// dropped or degraded and counted in the report.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Score`] only on an internal scoring invariant
    /// violation.
    #[instrument(skip_all, fields(payloads = payloads.len()))]
    pub async fn run(
        &self,
        payloads: Vec<RawPayload>,
    ) -> Result<(Digest, RunReport), PipelineError> {
        let deadline = self
            .config
            .oracle
            .run_timeout()
            .map(|timeout| Instant::now() + timeout);
        self.run_until(payloads, deadline).await
    }

    /// Same as [`Pipeline::run`] with an explicit analysis deadline.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub async fn run_until(
        &self,
        payloads: Vec<RawPayload>,
        deadline: Option<Instant>,
    ) -> Result<(Digest, RunReport), PipelineError> {
        let mut report = RunReport {
            payloads: payloads.len(),
            ..RunReport::default()
        };

        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match normalize(payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(error = %e, "dropping malformed payload");
                    report.dropped_malformed += 1;
                }
            }
        }
        report.normalized = records.len();
        info!(
            normalized = report.normalized,
            dropped = report.dropped_malformed,
            "normalization complete"
        );

        let (deduped, dedup_stats) = deduplicate(records);
        report.dedup = dedup_stats;

        let (analyzed, analysis_stats) = self
            .engine
            .analyze_all(deduped.into_records(), deadline)
            .await;
        report.analysis = analysis_stats;
        report.deadline_exceeded = analysis_stats.deadline_skipped > 0
            || deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if report.deadline_exceeded {
            warn!(
                skipped = analysis_stats.deadline_skipped,
                "run deadline exceeded, continuing with partial analysis"
            );
        }

        report.degraded_keys = analyzed
            .iter()
            .filter(|record| record.is_degraded())
            .map(|record| record.identity_key.clone())
            .collect();

        let scored = self.scorer.score_all(analyzed)?;
        let digest = select(scored, &self.config.selection);
        report.selected = digest.len();

        info!(
            selected = report.selected,
            degraded = report.degraded_keys.len(),
            "run complete"
        );
        Ok((digest, report))
    }
}
