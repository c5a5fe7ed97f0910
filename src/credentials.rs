//! Warehouse credential resolution.
//!
//! Credentials come from a single combined setting, `GCP_SERVICE_ACCOUNT_KEY`,
//! which holds either a path to a service-account key file or the key itself as
//! inline JSON. An existing path always wins. Inline JSON is staged to a
//! temporary file that lives exactly as long as the [`ResolvedCredential`].

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::CredentialError;

/// Where the service-account key comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    FilePath(PathBuf),
    InlineJson(Map<String, Value>),
}

impl CredentialSource {
    /// Classify a raw setting: existing path first, then inline JSON object.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Missing);
        }

        let path = Path::new(trimmed);
        if path.exists() {
            return Ok(Self::FilePath(path.to_path_buf()));
        }

        match serde_json::from_str::<Value>(trimmed).map_err(CredentialError::Malformed)? {
            Value::Object(map) => Ok(Self::InlineJson(map)),
            _ => Err(CredentialError::NotAnObject),
        }
    }

    /// Turn the source into a file location, staging inline JSON if needed.
    pub fn resolve(self) -> Result<ResolvedCredential, CredentialError> {
        match self {
            Self::FilePath(path) => {
                info!(path = %path.display(), "Using service account key file");
                Ok(ResolvedCredential { path, staged: None })
            }
            Self::InlineJson(map) => {
                let mut staged = tempfile::Builder::new()
                    .prefix("gcp-service-account-")
                    .suffix(".json")
                    .tempfile()
                    .map_err(CredentialError::Stage)?;

                serde_json::to_writer(staged.as_file_mut(), &map)
                    .map_err(|e| CredentialError::Stage(e.into()))?;
                staged.flush().map_err(CredentialError::Stage)?;

                let path = staged.path().to_path_buf();
                info!(path = %path.display(), "Staged inline service account key");
                Ok(ResolvedCredential {
                    path,
                    staged: Some(staged),
                })
            }
        }
    }
}

/// Resolve the combined credential setting, failing fast when it is absent.
pub fn resolve(raw: Option<&str>) -> Result<ResolvedCredential, CredentialError> {
    let raw = raw.ok_or(CredentialError::Missing)?;
    CredentialSource::parse(raw)?.resolve()
}

/// A credential file location, plus the staged file backing it (if any).
///
/// Dropping this deletes a staged file, so keep it alive for the lifetime of
/// the client that reads it.
#[derive(Debug)]
pub struct ResolvedCredential {
    path: PathBuf,
    staged: Option<NamedTempFile>,
}

impl ResolvedCredential {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    pub fn load_key(&self) -> Result<ServiceAccountKey, CredentialError> {
        ServiceAccountKey::from_file(&self.path)
    }
}

/// Fields of a Google service-account key that the token flow needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|e| CredentialError::InvalidKey {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(CredentialError::InvalidKey {
                path: path.to_path_buf(),
                reason: "client_email and private_key must be non-empty".to_string(),
            });
        }

        Ok(key)
    }
}
