//! Typed errors surfaced by the load orchestrator and credential resolver.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single load request.
///
/// Empty inputs are not errors: they come back as a warning
/// [`LoadOutcome`](crate::loader::LoadOutcome).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The caller supplied an unusable target or payload.
    #[error("{0}")]
    Validation(String),

    /// The payload could not be turned into a table.
    #[error("failed to read {input}: {cause:#}")]
    Decode { input: String, cause: anyhow::Error },

    /// The warehouse rejected or failed the load job.
    #[error("failed to load {destination}: {cause:#}")]
    Warehouse {
        destination: String,
        cause: anyhow::Error,
    },
}

impl LoadError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Startup failure while resolving warehouse credentials. Always fatal.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("GCP_SERVICE_ACCOUNT_KEY is not set")]
    Missing,

    #[error("GCP_SERVICE_ACCOUNT_KEY is neither an existing path nor valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("GCP_SERVICE_ACCOUNT_KEY holds JSON but not an object")]
    NotAnObject,

    #[error("failed to stage inline credentials to a temporary file")]
    Stage(#[source] std::io::Error),

    #[error("failed to read service account key {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account key {path}: {reason}")]
    InvalidKey { path: PathBuf, reason: String },
}
