// src/error.rs
//! Error taxonomy shared by transport, probes and the scheduler.

use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while checking one source.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The source configuration does not map to any probe.
    #[error("{0}")]
    Unsupported(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch {url}: http {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Process ran but exited unsuccessfully. `stdout` is kept because some
    /// tools (npm) print usable output before exiting non-zero.
    #[error("{command}: {detail}")]
    Exec {
        command: String,
        detail: String,
        stdout: String,
    },

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Missing(String),

    #[error("invalid local.regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("no releases; fallback commit failed: {0}")]
    NoReleasesFallback(Box<CheckError>),
}

/// Substrings that mark an opaque process failure as transient.
const TRANSIENT_MARKERS: [&str; 4] = ["timeout", "connection reset", "tls", "temporary"];

impl CheckError {
    /// Whether another attempt might succeed.
    ///
    /// Transport errors are classified structurally. Only process execution
    /// failures, which carry nothing but text, fall back to substring matching.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckError::Timeout(_) | CheckError::Cancelled | CheckError::Network { .. } => true,
            CheckError::Spawn { source, .. } => looks_transient(&source.to_string()),
            CheckError::Exec { detail, .. } => looks_transient(detail),
            CheckError::NoReleasesFallback(inner) => inner.is_retryable(),
            CheckError::Unsupported(_)
            | CheckError::HttpStatus { .. }
            | CheckError::Parse(_)
            | CheckError::Missing(_)
            | CheckError::InvalidRegex(_) => false,
        }
    }
}

fn looks_transient(text: &str) -> bool {
    let msg = text.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| msg.contains(m))
}

pub type CheckResult<T> = Result<T, CheckError>;
