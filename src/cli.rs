//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use digest_core::DigestConfig;

/// Build a ranked, category-balanced research digest.
///
/// Reads JSON arrays of paper and repository payloads, deduplicates them,
/// analyzes each record, scores it, and writes the selected digest as JSON.
#[derive(Parser, Debug)]
#[command(name = "research-digest")]
#[command(author, version, about)]
pub struct Args {
    /// JSON array of paper payloads
    #[arg(long, value_name = "FILE")]
    pub papers: Option<PathBuf>,

    /// JSON array of repository payloads
    #[arg(long, value_name = "FILE")]
    pub repos: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/research-digest/config.toml)
    #[arg(short = 'C', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for digest_<date>.json (default: outputs)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the digest to stdout instead of writing a file
    #[arg(long)]
    pub stdout: bool,

    /// Skip the analysis oracle and classify by keywords only
    #[arg(long)]
    pub offline: bool,

    /// Maximum records in the digest
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_items: Option<u64>,

    /// Maximum records per category
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub per_category: Option<u64>,

    /// Maximum concurrent oracle calls (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Deadline for the whole analysis stage in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub run_timeout: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Applies command-line overrides on top of file values.
    pub fn apply_overrides(&self, config: &mut DigestConfig) {
        if let Some(max_items) = self.max_items {
            config.selection.max_total_items = usize::try_from(max_items).unwrap_or(usize::MAX);
        }
        if let Some(per_category) = self.per_category {
            config.selection.max_items_per_category =
                usize::try_from(per_category).unwrap_or(usize::MAX);
        }
        if let Some(concurrency) = self.concurrency {
            config.oracle.concurrency = usize::from(concurrency);
        }
        if let Some(run_timeout) = self.run_timeout {
            config.oracle.run_timeout_secs = Some(run_timeout);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = Some(output_dir.clone());
        }
    }

    /// Default log filter.
    ///
    /// Priority: quiet flag > verbose flag > config `log_level` > info.
    /// `RUST_LOG` overrides all of these when set.
    #[must_use]
    pub fn log_level<'a>(&self, configured: Option<&'a str>) -> &'a str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => configured.unwrap_or("info"),
            1 => "debug",
            _ => "trace",
        }
    }
}
