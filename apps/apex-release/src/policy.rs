//! Release policy gate.
//!
//! Evaluates the evidence bundle (guardrails, e2e outcome, signed evidence)
//! against promotion thresholds, either locally or by deferring to an OPA
//! instance. Evidence signature verification fails closed: without a public
//! key the signature is unverified and the OPA input reports it as invalid.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};
use crate::evidence::{Evidence, EvidenceClaims};
use crate::guardrails::Guardrails;

const DEFAULT_OPA_URL: &str = "http://127.0.0.1:8181/v1/data/apex/rollout/allow";

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Defer the decision to OPA instead of evaluating locally.
    #[arg(long)]
    pub opa: bool,

    /// OPA decision endpoint; falls back to OPA_URL, then the local default.
    #[arg(long)]
    pub opa_url: Option<String>,

    /// Threshold configuration file.
    #[arg(long, default_value = "config/policy-gate.json")]
    pub gate: PathBuf,

    /// Directory holding guardrails.json and evidence.json.
    #[arg(long, default_value = "evidence")]
    pub evidence_dir: PathBuf,
}

/// Promotion thresholds. Latencies in milliseconds, error rate a fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub p95_edge: u64,
    pub p95_node: u64,
    pub error_rate: f64,
}

/// Outcome of checking the evidence JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigStatus {
    /// Signature checked against the published key and passed.
    Verified,
    /// Signature checked and failed, or the token is malformed or expired.
    Invalid,
    /// No public key available, so nothing could be checked.
    Unverified,
}

/// Document sent to OPA for a remote decision.
#[derive(Debug, Serialize)]
pub struct PolicyInput {
    pub environment: String,
    pub guardrails: Guardrails,
    pub tests: TestsInput,
    pub evidence: EvidenceInput,
}

#[derive(Debug, Serialize)]
pub struct TestsInput {
    pub e2e_pass: bool,
}

#[derive(Debug, Serialize)]
pub struct EvidenceInput {
    pub sig_valid: bool,
}

#[derive(Debug, Deserialize)]
struct OpaResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Check the evidence JWT against the JWKS_PUBLIC PEM, if one is set.
pub fn verify_evidence(evidence: Option<&Evidence>, public_pem: Option<&str>) -> SigStatus {
    let Some(evidence) = evidence else {
        return SigStatus::Invalid;
    };
    let Some(pem) = public_pem else {
        return SigStatus::Unverified;
    };
    let Ok(key) = DecodingKey::from_rsa_pem(pem.as_bytes()) else {
        return SigStatus::Invalid;
    };
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    match jsonwebtoken::decode::<EvidenceClaims>(&evidence.jwt, &key, &validation) {
        Ok(token) if token.claims.commit == evidence.commit => SigStatus::Verified,
        _ => SigStatus::Invalid,
    }
}

/// Local threshold evaluation; denial reasons are returned for the operator.
pub fn evaluate_local(
    gate: &Gate,
    guardrails: &Guardrails,
    evidence: Option<&Evidence>,
    sig: SigStatus,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if guardrails.p95_edge > gate.p95_edge {
        reasons.push(format!(
            "p95_edge {}ms exceeds {}ms",
            guardrails.p95_edge, gate.p95_edge
        ));
    }
    if guardrails.p95_node > gate.p95_node {
        reasons.push(format!(
            "p95_node {}ms exceeds {}ms",
            guardrails.p95_node, gate.p95_node
        ));
    }
    if guardrails.error_rate > gate.error_rate {
        reasons.push(format!(
            "error_rate {} exceeds {}",
            guardrails.error_rate, gate.error_rate
        ));
    }
    if !guardrails.e2e_pass {
        reasons.push("e2e checks did not pass".to_string());
    }
    match evidence {
        None => reasons.push("evidence bundle missing".to_string()),
        // A bundle whose token is empty never counts as present evidence,
        // even when no public key is configured to check it against.
        Some(ev) if ev.jwt.trim().is_empty() => {
            reasons.push("evidence jwt missing".to_string())
        }
        Some(_) => {}
    }
    if sig == SigStatus::Invalid {
        reasons.push("evidence signature invalid".to_string());
    }

    reasons
}

/// POST the input document to OPA and read back the decision.
///
/// OPA may answer with a bare boolean or an object carrying `allow`;
/// anything else is a deny. A transport failure or non-2xx status is
/// fatal rather than an implicit allow.
pub async fn evaluate_opa(opa_url: &str, input: &PolicyInput) -> CliResult<bool> {
    let client = reqwest::Client::new();
    let response = client
        .post(opa_url)
        .json(&serde_json::json!({ "input": input }))
        .send()
        .await
        .map_err(|e| CliError::PolicyEngineUnreachable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CliError::PolicyEngineUnreachable(format!(
            "status {}",
            response.status()
        )));
    }

    let body: OpaResponse = response
        .json()
        .await
        .map_err(|e| CliError::PolicyEngineUnreachable(e.to_string()))?;

    Ok(match body.result {
        Some(serde_json::Value::Bool(allow)) => allow,
        Some(serde_json::Value::Object(obj)) => {
            obj.get("allow") == Some(&serde_json::Value::Bool(true))
        }
        _ => false,
    })
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let raw = fs::read_to_string(path).map_err(|e| CliError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| CliError::BadJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Evaluate the gate and exit non-zero on a deny.
pub async fn run(args: PolicyArgs) -> CliResult<()> {
    let gate: Gate = load_json(&args.gate)?;
    let guardrails: Guardrails = load_json(&args.evidence_dir.join("guardrails.json"))?;
    let evidence: Evidence = load_json(&args.evidence_dir.join("evidence.json"))?;

    let public_pem = std::env::var("JWKS_PUBLIC").ok();
    let sig = verify_evidence(Some(&evidence), public_pem.as_deref());

    if args.opa {
        let opa_url = args
            .opa_url
            .or_else(|| std::env::var("OPA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OPA_URL.to_string());
        let environment =
            std::env::var("DEPLOY_ENV").unwrap_or_else(|_| "prod".to_string());

        let input = PolicyInput {
            environment,
            guardrails: guardrails.clone(),
            tests: TestsInput {
                e2e_pass: guardrails.e2e_pass,
            },
            evidence: EvidenceInput {
                sig_valid: sig == SigStatus::Verified,
            },
        };

        if evaluate_opa(&opa_url, &input).await? {
            println!("policy: allow (opa)");
            Ok(())
        } else {
            Err(CliError::PolicyDenied("opa denied promotion".to_string()))
        }
    } else {
        let reasons = evaluate_local(&gate, &guardrails, Some(&evidence), sig);
        if reasons.is_empty() {
            println!("policy: allow (local)");
            Ok(())
        } else {
            Err(CliError::PolicyDenied(reasons.join("; ")))
        }
    }
}
