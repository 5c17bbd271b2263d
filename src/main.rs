//! CLI entry point for the research digest.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use digest_core::{
    AnalysisOracle, ChatCompletionsOracle, DigestConfig, OfflineOracle, Pipeline, RawPayload,
    RunOutput, Source, load_config,
};
use serde_json::Value;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Default directory for digest files.
const DEFAULT_OUTPUT_DIR: &str = "outputs";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref())?;
    let mut config = loaded.config;
    args.apply_overrides(&mut config);

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > info
    let default_level = args.log_level(config.log_level.as_deref());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(
        ?args,
        config_path = ?loaded.path,
        from_file = loaded.loaded_from_file,
        "configuration loaded"
    );
    config.validate().context("Invalid configuration")?;
    info!("Research digest starting");

    if args.papers.is_none() && args.repos.is_none() {
        bail!("No input provided. Pass --papers <FILE> and/or --repos <FILE>.");
    }

    let mut payloads = Vec::new();
    let mut rejected = 0;
    for (path, source) in [(&args.papers, Source::Paper), (&args.repos, Source::Repository)] {
        if let Some(path) = path {
            let (parsed, dropped) = read_payloads(path, source)?;
            payloads.extend(parsed);
            rejected += dropped;
        }
    }

    let oracle = build_oracle(&config, args.offline);
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let pipeline = Pipeline::new(config, oracle)?;
    let (digest, mut report) = pipeline.run(payloads).await?;
    report.payloads += rejected;
    report.dropped_malformed += rejected;

    if !report.degraded_keys.is_empty() {
        warn!(
            degraded = report.degraded_keys.len(),
            "some records were analyzed without a complete oracle reply"
        );
    }

    let output = RunOutput {
        generated_at: Utc::now(),
        report,
        digest,
    };
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize digest")?;

    if args.stdout {
        println!("{json}");
    } else {
        let path = write_digest(&output_dir, &output, &json)?;
        info!(path = %path.display(), selected = output.digest.len(), "Digest written");
    }

    Ok(())
}

/// Reads one JSON array of payloads.
///
/// A file that is not a JSON array fails as a whole. Any element that does
/// not fit the payload shape, including non-objects, is dropped and counted.
fn read_payloads(path: &Path, source: Source) -> Result<(Vec<RawPayload>, usize)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {source} payloads from '{}'", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
    let Value::Array(items) = value else {
        bail!("'{}' must contain a JSON array of {source} payloads", path.display());
    };
    let mut payloads = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for (index, item) in items.into_iter().enumerate() {
        match RawPayload::from_json(source, item) {
            Ok(payload) => payloads.push(payload),
            Err(e) => {
                warn!(file = %path.display(), index, error = %e, "dropping malformed payload");
                dropped += 1;
            }
        }
    }
    info!(file = %path.display(), %source, count = payloads.len(), "payloads loaded");
    Ok((payloads, dropped))
}

fn build_oracle(config: &DigestConfig, offline: bool) -> Arc<dyn AnalysisOracle> {
    if offline {
        info!("Offline mode: records are classified by keywords only");
        return Arc::new(OfflineOracle::new("offline mode"));
    }
    match ChatCompletionsOracle::from_config(&config.oracle) {
        Ok(oracle) => {
            debug!(endpoint = %oracle.endpoint(), "using chat-completions oracle");
            Arc::new(oracle)
        }
        Err(e) => {
            warn!(error = %e, "Analysis oracle unavailable, falling back to keyword analysis");
            Arc::new(OfflineOracle::new(e.to_string()))
        }
    }
}

fn write_digest(output_dir: &Path, output: &RunOutput, json: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", output_dir.display())
    })?;
    let path = output_dir.join(format!(
        "digest_{}.json",
        output.generated_at.format("%Y-%m-%d")
    ));
    fs::write(&path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(path)
}
