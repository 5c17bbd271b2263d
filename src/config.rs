//! Run configuration: weights, budgets, oracle settings, vocabularies.
//!
//! Loaded from TOML. Every value is validated eagerly by
//! [`DigestConfig::validate`] before any network activity.
//!
//! ```toml
//! log_level = "info"
//!
//! [weights]
//! popularity = 0.25
//! technical_innovation = 0.20
//! application_value = 0.10
//! readability = 0.15
//! experimental_thoroughness = 0.15
//! author_influence = 0.15
//!
//! [selection]
//! max_total_items = 20
//! max_items_per_category = 5
//!
//! [oracle]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! concurrency = 4
//! max_attempts = 3
//! call_timeout_secs = 60
//! run_timeout_secs = 900
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::analysis::chat::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::analysis::fallback::default_category_tags;
use crate::analysis::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::scoring::influence::default_influential_organizations;
use crate::scoring::popularity::default_top_venues;
use crate::scoring::{ScoringWeights, WeightsError};

/// Directory name under the XDG config root.
const CONFIG_DIR_NAME: &str = "research-digest";

const MAX_CONCURRENCY: usize = 32;
const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Invalid configuration values. Fatal before the run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Scoring weights violate their invariant.
    #[error("invalid weights: {0}")]
    InvalidWeights(#[from] WeightsError),

    /// A selection budget is zero.
    #[error("invalid value for `{field}`: {value}. Expected at least 1")]
    InvalidBudget {
        /// Offending budget key.
        field: &'static str,
        /// The rejected value.
        value: usize,
    },

    /// Oracle concurrency outside `1..=32`.
    #[error("invalid value for `concurrency`: {value}. Expected range: 1..={MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Any other out-of-range oracle setting.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    InvalidOracleSetting {
        /// Offending key.
        field: &'static str,
        /// The rejected value, rendered.
        value: String,
        /// Human-readable accepted range.
        expected: &'static str,
    },

    /// The closed category vocabulary is empty.
    #[error("vocabulary `category_tags` must not be empty")]
    EmptyVocabulary,
}

/// Output budgets for the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionBudget {
    /// Upper bound on the digest size.
    pub max_total_items: usize,
    /// Upper bound on accepted records per category.
    pub max_items_per_category: usize,
}

impl Default for SelectionBudget {
    fn default() -> Self {
        Self {
            max_total_items: 20,
            max_items_per_category: 5,
        }
    }
}

impl SelectionBudget {
    /// Creates validated budgets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBudget`] if either value is zero.
    pub fn new(max_total_items: usize, max_items_per_category: usize) -> Result<Self, ConfigError> {
        let budget = Self {
            max_total_items,
            max_items_per_category,
        };
        budget.validate()?;
        Ok(budget)
    }

    /// Checks both budgets are at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBudget`] naming the first zero budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_items == 0 {
            return Err(ConfigError::InvalidBudget {
                field: "max_total_items",
                value: 0,
            });
        }
        if self.max_items_per_category == 0 {
            return Err(ConfigError::InvalidBudget {
                field: "max_items_per_category",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Analysis oracle connection and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// API root of an OpenAI-compatible service.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Concurrent oracle calls (1..=32).
    pub concurrency: usize,
    /// Attempts per record including the first call (1..=10).
    pub max_attempts: u32,
    /// Per-call timeout in seconds (1..=3600).
    pub call_timeout_secs: u64,
    /// Whole-run analysis deadline in seconds; unset means no deadline.
    pub run_timeout_secs: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout_secs: 60,
            run_timeout_secs: None,
        }
    }
}

impl OracleConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(ConfigError::InvalidOracleSetting {
                field: "max_attempts",
                value: self.max_attempts.to_string(),
                expected: "1..=10",
            });
        }
        validate_timeout_secs("call_timeout_secs", Some(self.call_timeout_secs))?;
        validate_timeout_secs("run_timeout_secs", self.run_timeout_secs)?;
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidOracleSetting {
                field: "base_url",
                value: String::new(),
                expected: "a non-empty http(s) URL",
            });
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        return Err(ConfigError::InvalidOracleSetting {
            field,
            value: value.to_string(),
            expected: "1..=3600",
        });
    }
    Ok(())
}

/// Closed vocabularies used by classification and scoring heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VocabularyConfig {
    /// Category tags the oracle may assign.
    pub category_tags: Vec<String>,
    /// Organizations that raise the author-influence estimate.
    pub influential_organizations: Vec<String>,
    /// Venues that raise the popularity estimate of uncited papers.
    pub top_venues: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            category_tags: default_category_tags(),
            influential_organizations: default_influential_organizations(),
            top_venues: default_top_venues(),
        }
    }
}

/// On-disk shape. Weights stay raw so their violations surface as
/// [`ConfigError::InvalidWeights`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    log_level: Option<String>,
    output_dir: Option<PathBuf>,
    weights: Option<BTreeMap<String, f64>>,
    selection: SelectionBudget,
    oracle: OracleConfig,
    vocabulary: VocabularyConfig,
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DigestConfig {
    /// Default log filter when neither `RUST_LOG` nor CLI flags set one.
    pub log_level: Option<String>,
    /// Directory the digest file is written to.
    pub output_dir: Option<PathBuf>,
    pub weights: ScoringWeights,
    pub selection: SelectionBudget,
    pub oracle: OracleConfig,
    pub vocabulary: VocabularyConfig,
}

impl DigestConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML, unknown keys, or any value
    /// rejected by [`DigestConfig::validate`].
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(raw).context("Invalid config syntax")?;
        let weights = match file.weights {
            Some(named) => ScoringWeights::try_from(named).map_err(ConfigError::from)?,
            None => ScoringWeights::default(),
        };
        let config = Self {
            log_level: file.log_level,
            output_dir: file.output_dir,
            weights,
            selection: file.selection,
            oracle: file.oracle,
            vocabulary: file.vocabulary,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every invariant the run depends on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.validate()?;
        self.oracle.validate()?;
        if self.vocabulary.category_tags.is_empty() {
            return Err(ConfigError::EmptyVocabulary);
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    pub config: DigestConfig,
    /// Whether values came from a file rather than defaults.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/research-digest/config.toml`
/// 2. `$HOME/.config/research-digest/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads configuration.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and defaults otherwise.
///
/// # Errors
///
/// Returns an error when an explicit file is missing, or any file cannot be
/// read, parsed, or validated.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file '{}' does not exist", path.display());
        }
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file_config(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => {
            debug!(path = ?path, "no config file, using defaults");
            Ok(LoadedConfig {
                path,
                config: DigestConfig::default(),
                loaded_from_file: false,
            })
        }
    }
}

fn load_file_config(path: &Path) -> Result<DigestConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    DigestConfig::from_toml_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}
