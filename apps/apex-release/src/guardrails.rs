//! Guardrail measurement against a preview deployment.
//!
//! Samples a configured set of paths, records p95 latency and error rate,
//! and writes `guardrails.json` for the policy gate. Each request carries
//! its own timeout; a timeout, connection failure, redirect, or non-2xx
//! response counts as an error sample.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Error-rate ceiling below which the smoke check passes.
const SMOKE_ERROR_RATE: f64 = 0.01;

#[derive(Args, Debug)]
pub struct GuardrailsArgs {
    /// Base URL of the deployment under test; defaults to `.preview-url`.
    #[arg(long)]
    pub url: Option<String>,

    /// Sampling configuration file.
    #[arg(long, default_value = "config/rollout-targets.json")]
    pub targets: PathBuf,

    /// Directory guardrails.json is written to.
    #[arg(long, default_value = "evidence")]
    pub out_dir: PathBuf,
}

/// Paths to sample and how hard to push them.
#[derive(Debug, Deserialize)]
pub struct TargetsConfig {
    pub paths: Vec<String>,
    #[serde(default = "default_samples")]
    pub samples_per_path: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_samples() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Measured release-health metrics consumed by the policy gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardrails {
    pub p95_edge: u64,
    pub p95_node: u64,
    pub error_rate: f64,
    pub e2e_pass: bool,
}

/// p95 over latencies by nearest-rank on the sorted slice:
/// `sorted[floor(0.95 * (n - 1))]`.
pub fn p95_ms(latencies: &mut [f64]) -> f64 {
    assert!(!latencies.is_empty(), "p95 over empty sample set");
    latencies.sort_by(|a, b| a.partial_cmp(b).expect("finite latencies"));
    let idx = (0.95 * (latencies.len() - 1) as f64).floor() as usize;
    latencies[idx]
}

/// Fold raw samples into the guardrail document.
pub fn summarize(mut latencies: Vec<f64>, errors: u32) -> CliResult<Guardrails> {
    if latencies.is_empty() {
        return Err(CliError::NoSamples);
    }

    let p95 = p95_ms(&mut latencies).round() as u64;
    let error_rate = f64::from(errors) / (f64::from(errors) + latencies.len() as f64);
    let error_rate = (error_rate * 1e6).round() / 1e6;

    Ok(Guardrails {
        p95_edge: p95,
        p95_node: p95,
        error_rate,
        e2e_pass: error_rate <= SMOKE_ERROR_RATE,
    })
}

fn load_targets(path: &Path) -> CliResult<TargetsConfig> {
    let raw = fs::read_to_string(path).map_err(|e| CliError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| CliError::BadJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn resolve_url(flag: Option<String>) -> CliResult<String> {
    if let Some(url) = flag {
        return Ok(url.trim_end_matches('/').to_string());
    }
    match fs::read_to_string(".preview-url") {
        Ok(contents) if !contents.trim().is_empty() => {
            Ok(contents.trim().trim_end_matches('/').to_string())
        }
        _ => Err(CliError::MissingPreviewUrl),
    }
}

/// Sample every configured path and collect latencies and error count.
pub async fn sample(base_url: &str, config: &TargetsConfig) -> (Vec<f64>, u32) {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("HTTP client");
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut latencies = Vec::new();
    let mut errors = 0u32;

    for path in &config.paths {
        let url = format!("{base_url}{path}");
        for _ in 0..config.samples_per_path {
            let started = Instant::now();
            let outcome = client.get(&url).timeout(timeout).send().await;
            match outcome {
                Ok(response) if response.status().is_success() => {
                    latencies.push(started.elapsed().as_secs_f64() * 1000.0);
                }
                _ => errors += 1,
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    (latencies, errors)
}

/// Measure the deployment and write `guardrails.json`.
pub async fn run(args: GuardrailsArgs) -> CliResult<()> {
    let base_url = resolve_url(args.url)?;
    let config = load_targets(&args.targets)?;

    let (latencies, errors) = sample(&base_url, &config).await;
    let guardrails = summarize(latencies, errors)?;

    fs::create_dir_all(&args.out_dir).map_err(|e| CliError::Write {
        path: args.out_dir.display().to_string(),
        source: e,
    })?;
    let out = args.out_dir.join("guardrails.json");
    fs::write(
        &out,
        serde_json::to_string_pretty(&guardrails).expect("serializable document"),
    )
    .map_err(|e| CliError::Write {
        path: out.display().to_string(),
        source: e,
    })?;

    println!(
        "guardrails: p95_edge={}ms error_rate={} e2e_pass={} -> {}",
        guardrails.p95_edge,
        guardrails.error_rate,
        guardrails.e2e_pass,
        out.display()
    );
    Ok(())
}
