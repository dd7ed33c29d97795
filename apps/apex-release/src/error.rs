//! CLI error type with process exit-code mapping.
//!
//! These commands run in CI with no end user; every failure is a printed
//! diagnostic and a non-zero exit, and a policy denial is an ordinary,
//! expected outcome rather than a crash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Could not resolve commit: {0}")]
    CommitUnavailable(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    BadJson { path: String, message: String },

    #[error("Evidence signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("No preview URL: pass --url or create .preview-url")]
    MissingPreviewUrl,

    #[error("No successful guardrail samples (all requests failed)")]
    NoSamples,

    #[error("Policy engine unreachable: {0}")]
    PolicyEngineUnreachable(String),

    #[error("Policy denied: {0}")]
    PolicyDenied(String),
}

impl CliError {
    /// Print the diagnostic to stderr.
    pub fn print(&self) {
        eprintln!("error: {self}");
    }

    /// All failures, including denials, exit 1; CI treats that as a block.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type CliResult<T> = Result<T, CliError>;
