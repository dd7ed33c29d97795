//! Build-evidence manifest and signing.
//!
//! Hashes a fixed allow-list of build artifacts, writes the manifest, and
//! signs `{commit, manifest}` as a short-lived RS256 JWT. The signing key is
//! supplied out-of-band (`JWKS_PRIVATE`); its absence is fatal because this
//! runs as a deployment-time gate.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use clap::Args;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CliError, CliResult};

/// Artifacts considered release evidence when present.
pub const DEFAULT_TARGETS: &[&str] = &["Cargo.toml", "Cargo.lock", "apps", "crates"];

/// Evidence JWT lifetime: 15 minutes.
const EVIDENCE_TTL_SECS: i64 = 15 * 60;

#[derive(Args, Debug)]
pub struct EvidenceArgs {
    /// Commit to attest; defaults to $GITHUB_SHA, then `git rev-parse HEAD`.
    #[arg(long)]
    pub commit: Option<String>,

    /// Directory evidence files are written to.
    #[arg(long, default_value = "evidence")]
    pub out_dir: PathBuf,

    /// Root the target allow-list is resolved against.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

/// One hashed artifact. Directories are recorded by presence only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: Option<String>,
    pub dir: bool,
}

/// The unsigned manifest document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub commit: String,
    pub manifest: Vec<ManifestEntry>,
    pub created_at: DateTime<Utc>,
}

/// The signed evidence document consumed by the policy gate.
#[derive(Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub commit: String,
    pub jwt: String,
}

/// Claims carried by the evidence JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvidenceClaims {
    pub commit: String,
    pub manifest: Vec<ManifestEntry>,
    pub iat: i64,
    pub exp: i64,
}

/// Resolve the commit to attest.
pub fn resolve_commit(flag: Option<String>) -> CliResult<String> {
    if let Some(commit) = flag {
        return Ok(commit);
    }
    if let Ok(sha) = std::env::var("GITHUB_SHA") {
        if !sha.trim().is_empty() {
            return Ok(sha.trim().to_string());
        }
    }
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .map_err(|e| CliError::CommitUnavailable(e.to_string()))?;
    if !output.status.success() {
        return Err(CliError::CommitUnavailable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Hash a single artifact; directories are recorded without hashing.
pub fn hash_target(root: &Path, target: &str) -> CliResult<ManifestEntry> {
    let full = root.join(target);
    let metadata = fs::metadata(&full).map_err(|e| CliError::Read {
        path: full.display().to_string(),
        source: e,
    })?;

    if metadata.is_dir() {
        return Ok(ManifestEntry {
            path: target.to_string(),
            sha256: None,
            dir: true,
        });
    }

    let data = fs::read(&full).map_err(|e| CliError::Read {
        path: full.display().to_string(),
        source: e,
    })?;
    let digest = Sha256::digest(&data);

    Ok(ManifestEntry {
        path: target.to_string(),
        sha256: Some(hex::encode(digest)),
        dir: false,
    })
}

/// Hash every allow-listed target that exists under `root`.
pub fn build_manifest(root: &Path, targets: &[&str]) -> CliResult<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    for target in targets {
        if root.join(target).exists() {
            entries.push(hash_target(root, target)?);
        }
    }
    Ok(entries)
}

/// Sign `{commit, manifest}` as an RS256 JWT with a 15-minute expiry.
pub fn sign_evidence(
    commit: &str,
    manifest: Vec<ManifestEntry>,
    private_key_pem: &str,
    kid: Option<String>,
) -> CliResult<String> {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;

    let now = Utc::now().timestamp();
    let claims = EvidenceClaims {
        commit: commit.to_string(),
        manifest,
        iat: now,
        exp: now + EVIDENCE_TTL_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid;

    Ok(jsonwebtoken::encode(&header, &claims, &key)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let body = serde_json::to_string_pretty(value).expect("serializable document");
    fs::write(path, body).map_err(|e| CliError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

/// Produce `manifest.json` and `evidence.json` under the output directory.
pub fn run(args: EvidenceArgs) -> CliResult<()> {
    let commit = resolve_commit(args.commit)?;

    let pem = std::env::var("JWKS_PRIVATE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(CliError::MissingEnv("JWKS_PRIVATE"))?;
    let kid = std::env::var("JWKS_KID").ok().filter(|v| !v.is_empty());

    let entries = build_manifest(&args.root, DEFAULT_TARGETS)?;

    fs::create_dir_all(&args.out_dir).map_err(|e| CliError::Write {
        path: args.out_dir.display().to_string(),
        source: e,
    })?;

    let manifest = Manifest {
        commit: commit.clone(),
        manifest: entries.clone(),
        created_at: Utc::now(),
    };
    write_json(&args.out_dir.join("manifest.json"), &manifest)?;

    let jwt = sign_evidence(&commit, entries, &pem, kid)?;
    let evidence = Evidence { commit, jwt };
    write_json(&args.out_dir.join("evidence.json"), &evidence)?;

    println!(
        "evidence signed -> {}",
        args.out_dir.join("evidence.json").display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_target_file_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("artifact.bin"), b"contents").unwrap();

        let entry = hash_target(dir.path(), "artifact.bin").unwrap();
        assert!(!entry.dir);
        let digest = entry.sha256.unwrap();
        assert_eq!(digest.len(), 64);
        // sha256("contents")
        assert_eq!(
            digest,
            "d1b2a59fbea7e20077af9f91b27e95e865061b270be03ff539ab3b73587882e8"
        );
    }

    #[test]
    fn test_hash_target_directory_has_no_digest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        let entry = hash_target(dir.path(), "src").unwrap();
        assert!(entry.dir);
        assert!(entry.sha256.is_none());
    }

    #[test]
    fn test_build_manifest_skips_missing_targets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), b"[package]").unwrap();
        fs::create_dir(dir.path().join("crates")).unwrap();

        let entries = build_manifest(dir.path(), DEFAULT_TARGETS).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Cargo.toml", "crates"]);
    }

    #[test]
    fn test_resolve_commit_prefers_flag() {
        assert_eq!(
            resolve_commit(Some("abc123".into())).unwrap(),
            "abc123"
        );
    }
}
