//! Analysis engine for concurrent oracle calls with retry support.
//!
//! The engine analyzes a batch of records using a semaphore-based
//! concurrency limit, retrying transient oracle failures with exponential
//! backoff. No record is ever dropped: a record whose oracle call fails for
//! good is degraded with midpoint dimension scores and keyword tags.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use digest_core::analysis::{AnalysisEngine, OfflineOracle, RetryPolicy};
//!
//! # async fn example(records: Vec<digest_core::CanonicalRecord>) -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = Arc::new(OfflineOracle::new("no API key configured"));
//! let engine = AnalysisEngine::new(oracle, 4, RetryPolicy::default(), Duration::from_secs(60))?;
//! let (records, stats) = engine.analyze_all(records, None).await;
//! println!("complete: {}, unavailable: {}", stats.complete, stats.unavailable);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::fallback::{self, default_category_tags};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, retry_after_delay};
use super::schema::{self, AnalysisOutcome};
use super::{AnalysisOracle, OracleError, OracleRequest};
use crate::record::{AnalysisStatus, CanonicalRecord};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 32;

/// Default number of concurrent oracle calls.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Reason recorded on records skipped after the run deadline.
const DEADLINE_REASON: &str = "deadline exceeded";

/// Error type for analysis engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Counters from one analysis batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    /// Records with a fully valid (possibly repaired) reply.
    pub complete: usize,
    /// Records whose reply needed at least one defaulted dimension.
    pub partial: usize,
    /// Records analyzed by fallback because the oracle was unavailable.
    pub unavailable: usize,
    /// Retry attempts across all records.
    pub retried: usize,
    /// Records skipped without a call because the run deadline had passed.
    pub deadline_skipped: usize,
}

impl AnalysisStats {
    /// Total records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.complete + self.partial + self.unavailable
    }

    /// Records that are not complete.
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.partial + self.unavailable
    }

    fn count(&mut self, report: &TaskReport, status: AnalysisStatus) {
        match status {
            AnalysisStatus::Complete => self.complete += 1,
            AnalysisStatus::Partial => self.partial += 1,
            AnalysisStatus::Unavailable => self.unavailable += 1,
        }
        self.retried += report.attempts.saturating_sub(1) as usize;
        if report.deadline_skipped {
            self.deadline_skipped += 1;
        }
    }
}

/// Per-record bookkeeping returned by each task.
#[derive(Debug, Clone, Copy, Default)]
struct TaskReport {
    attempts: u32,
    deadline_skipped: bool,
}

/// Concurrent analysis driver.
///
/// # Concurrency Model
///
/// - Each record is analyzed in its own Tokio task, which owns the record
/// - A semaphore permit is acquired before the first oracle call
/// - Permits are released automatically when the task completes (RAII)
/// - Results are collected back into input order before returning
///
/// # Deadline
///
/// When a run deadline is given, records whose call has not started by then
/// are degraded immediately. Calls already in flight finish their retry
/// budget.
pub struct AnalysisEngine {
    oracle: Arc<dyn AnalysisOracle>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
    vocabulary: Arc<Vec<String>>,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("concurrency", &self.concurrency)
            .field("retry_policy", &self.retry_policy)
            .field("call_timeout", &self.call_timeout)
            .field("vocabulary", &self.vocabulary)
            .finish_non_exhaustive()
    }
}

impl AnalysisEngine {
    /// Creates an engine over `oracle` with the default tag vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// `1..=32`.
    #[instrument(level = "debug", skip(oracle, retry_policy))]
    pub fn new(
        oracle: Arc<dyn AnalysisOracle>,
        concurrency: usize,
        retry_policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            call_timeout_ms = call_timeout.as_millis(),
            "creating analysis engine"
        );

        Ok(Self {
            oracle,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            call_timeout,
            vocabulary: Arc::new(default_category_tags()),
        })
    }

    /// Replaces the closed category-tag vocabulary.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vec<String>) -> Self {
        self.vocabulary = Arc::new(vocabulary);
        self
    }

    /// Analyzes every record, returning them in input order with stats.
    ///
    /// Individual oracle failures never fail the batch; they degrade the
    /// affected record.
    #[instrument(skip(self, records, deadline), fields(count = records.len()))]
    pub async fn analyze_all(
        &self,
        records: Vec<CanonicalRecord>,
        deadline: Option<Instant>,
    ) -> (Vec<CanonicalRecord>, AnalysisStats) {
        info!(concurrency = self.concurrency, "starting analysis");

        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            // Kept only to degrade the record if its task panics.
            let backup = record.clone();
            let task = RecordTask {
                oracle: Arc::clone(&self.oracle),
                semaphore: Arc::clone(&self.semaphore),
                retry_policy: self.retry_policy.clone(),
                call_timeout: self.call_timeout,
                vocabulary: Arc::clone(&self.vocabulary),
                deadline,
            };
            handles.push((tokio::spawn(task.run(record)), backup));
        }

        let mut stats = AnalysisStats::default();
        let mut analyzed = Vec::with_capacity(handles.len());
        for (handle, backup) in handles {
            let (record, report) = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        identity_key = %backup.identity_key,
                        error = %e,
                        "analysis task panicked"
                    );
                    let mut record = backup;
                    fallback::unavailable(&record, "analysis task failed", &self.vocabulary)
                        .apply_to(&mut record);
                    (record, TaskReport::default())
                }
            };
            let status = record
                .analysis
                .as_ref()
                .map_or(AnalysisStatus::Unavailable, |analysis| analysis.status);
            stats.count(&report, status);
            analyzed.push(record);
        }

        info!(
            complete = stats.complete,
            partial = stats.partial,
            unavailable = stats.unavailable,
            retried = stats.retried,
            deadline_skipped = stats.deadline_skipped,
            "analysis complete"
        );
        (analyzed, stats)
    }
}

/// Everything one spawned task needs, owned.
struct RecordTask {
    oracle: Arc<dyn AnalysisOracle>,
    semaphore: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
    vocabulary: Arc<Vec<String>>,
    deadline: Option<Instant>,
}

impl RecordTask {
    async fn run(self, mut record: CanonicalRecord) -> (CanonicalRecord, TaskReport) {
        let permit = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, Arc::clone(&self.semaphore).acquire_owned())
                    .await
                {
                    Ok(permit) => permit,
                    Err(_) => return self.skip_for_deadline(record),
                }
            }
            None => Arc::clone(&self.semaphore).acquire_owned().await,
        };
        let Ok(_permit) = permit else {
            fallback::unavailable(&record, "analysis engine shut down", &self.vocabulary)
                .apply_to(&mut record);
            return (record, TaskReport::default());
        };
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return self.skip_for_deadline(record);
        }

        let request = OracleRequest::from_record(&record);
        let (outcome, attempts) = match self.call_with_retry(&request, &record.identity_key).await {
            Ok((reply, attempts)) => (
                schema::validate(&reply, &record, &self.vocabulary),
                attempts,
            ),
            Err((OracleError::MalformedReply { reason }, attempts)) => {
                let mut outcome = schema::validate(&Value::Null, &record, &self.vocabulary);
                outcome.analysis.degraded_reason =
                    Some(format!("malformed oracle reply: {reason}"));
                (outcome, attempts)
            }
            Err((error, attempts)) => (
                fallback::unavailable(&record, error.to_string(), &self.vocabulary),
                attempts,
            ),
        };
        log_outcome(&record, &outcome, attempts);
        outcome.apply_to(&mut record);
        (
            record,
            TaskReport {
                attempts,
                deadline_skipped: false,
            },
        )
    }

    fn skip_for_deadline(&self, mut record: CanonicalRecord) -> (CanonicalRecord, TaskReport) {
        warn!(identity_key = %record.identity_key, "run deadline passed, skipping oracle call");
        fallback::unavailable(&record, DEADLINE_REASON, &self.vocabulary).apply_to(&mut record);
        (
            record,
            TaskReport {
                attempts: 0,
                deadline_skipped: true,
            },
        )
    }

    /// Calls the oracle, retrying transient failures.
    ///
    /// Returns the reply and attempt count, or the last error and attempt count.
    #[instrument(skip(self, request), fields(identity_key = %identity_key))]
    async fn call_with_retry(
        &self,
        request: &OracleRequest,
        identity_key: &str,
    ) -> Result<(Value, u32), (OracleError, u32)> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "calling oracle");

            let result = tokio::time::timeout(
                self.call_timeout,
                self.oracle.analyze(request, &self.vocabulary),
            )
            .await
            .unwrap_or_else(|_| Err(OracleError::timeout(self.call_timeout)));

            let error = match result {
                Ok(reply) => return Ok((reply, attempt)),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            let server_delay = if failure_type == FailureType::RateLimited {
                retry_after_delay(&error)
            } else {
                None
            };

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = server_delay.unwrap_or(backoff_delay);
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = server_delay.is_some(),
                        error = %error,
                        "retrying oracle call"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying oracle call");
                    return Err((error, attempt));
                }
            }
        }
    }
}

fn log_outcome(record: &CanonicalRecord, outcome: &AnalysisOutcome, attempts: u32) {
    match outcome.analysis.status {
        AnalysisStatus::Complete => debug!(
            identity_key = %record.identity_key,
            attempts,
            tags = ?outcome.category_tags,
            "record analyzed"
        ),
        AnalysisStatus::Partial | AnalysisStatus::Unavailable => warn!(
            identity_key = %record.identity_key,
            attempts,
            status = ?outcome.analysis.status,
            reason = outcome.analysis.degraded_reason.as_deref().unwrap_or_default(),
            "record analysis degraded"
        ),
    }
}
