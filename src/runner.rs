//! High-level runner API for the BigQuery loader service.
//!
//! This module wires configuration into the running service: logging,
//! credentials, the BigQuery client, the load orchestrator and the HTTP
//! router. It is the primary API for the binary.

use anyhow::{Context, Result, anyhow};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{self, AppState, Tenancy};
use crate::credentials::{self, ServiceAccountKey};
use crate::loader::Loader;
use crate::warehouse::{BigQueryArgsBuilder, BigQueryClient, ServiceAccountTokenSource};

pub use crate::telemetry::{LogConfig, LogFormat};

/// How destination project and dataset are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenancyMode {
    Single,
    Multi,
}

impl TenancyMode {
    /// Parse tenancy mode from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "single" => Ok(TenancyMode::Single),
            "multi" => Ok(TenancyMode::Multi),
            _ => Err(anyhow!(
                "Unsupported tenancy: {}. Supported values: single, multi",
                s
            )),
        }
    }
}

/// Arguments for running the service
#[derive(Debug, Clone)]
pub struct ServeArgs {
    // Credentials and warehouse
    /// Path to a service-account key file, or the key JSON itself
    pub service_account_key: Option<String>,
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
    pub location: Option<String>,
    pub api_base: Option<String>,
    pub upload_base: Option<String>,
    pub poll_interval: Duration,

    // HTTP
    pub tenancy: TenancyMode,
    pub bind: SocketAddr,
    pub service_name: String,
    pub max_upload_mb: usize,

    pub log: LogConfig,
}

/// Run the service until ctrl-c.
///
/// Startup fails, and nothing is served, when logging cannot be set up, the
/// credential cannot be resolved, or the project and dataset configuration is
/// incomplete for the chosen tenancy.
pub async fn run_server(args: ServeArgs) -> Result<()> {
    let _log_guard = crate::telemetry::init_logging(&args.log)?;

    // Held until shutdown so an inline key staged to disk outlives the client
    let credential = credentials::resolve(args.service_account_key.as_deref())?;
    let key = credential.load_key()?;

    let project_id = resolve_project(args.project_id.as_deref(), &key)?;
    let tenancy = resolve_tenancy(args.tenancy, &project_id, args.dataset_id.as_deref())?;
    let body_limit = max_upload_bytes(args.max_upload_mb)?;

    let mut client_args = BigQueryArgsBuilder::default();
    client_args
        .project_id(project_id.as_str())
        .poll_interval(args.poll_interval);
    if let Some(location) = &args.location {
        client_args.location(location.as_str());
    }
    if let Some(api_base) = &args.api_base {
        client_args.api_base(api_base.as_str());
    }
    if let Some(upload_base) = &args.upload_base {
        client_args.upload_base(upload_base.as_str());
    }
    let client_args = client_args
        .build()
        .context("Invalid BigQuery client configuration")?;

    let tokens = Arc::new(ServiceAccountTokenSource::new(&key)?);
    let client = BigQueryClient::new(client_args, tokens)?;
    let loader = Loader::new(Arc::new(client));

    tracing::info!(
        service = %args.service_name,
        project_id = %project_id,
        tenancy = ?args.tenancy,
        credential = %credential.path().display(),
        staged = credential.is_staged(),
        "warehouse client ready"
    );

    let app = api::router(
        AppState {
            loader,
            tenancy,
            service_name: args.service_name.clone(),
        },
        body_limit,
    );

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!(address = %args.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("shut down");
    drop(credential);
    Ok(())
}

/// The explicit project wins; otherwise the key's own project is used.
fn resolve_project(explicit: Option<&str>, key: &ServiceAccountKey) -> Result<String> {
    explicit
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or(key.project_id.as_deref())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!("No project configured. Set GCP_PROJECT_ID or use a key with a project_id")
        })
}

fn resolve_tenancy(mode: TenancyMode, project_id: &str, dataset_id: Option<&str>) -> Result<Tenancy> {
    match mode {
        TenancyMode::Single => {
            let dataset_id = dataset_id
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| anyhow!("BQ_DATASET_ID is required for single tenancy"))?;
            Ok(Tenancy::Single {
                project_id: project_id.to_string(),
                dataset_id: dataset_id.to_string(),
            })
        }
        TenancyMode::Multi => Ok(Tenancy::Multi),
    }
}

/// Request body limit in bytes for an upload limit in MiB
fn max_upload_bytes(max_upload_mb: usize) -> Result<usize> {
    max_upload_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow!("LOADER_MAX_UPLOAD_MB is too large: {max_upload_mb}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
