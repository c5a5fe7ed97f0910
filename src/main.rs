use bigquery_loader::config::{DEFAULT_MAX_UPLOAD_MB, DEFAULT_SERVICE_NAME};
use bigquery_loader::runner::{LogConfig, LogFormat, ServeArgs, TenancyMode, run_server};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP service that loads JSON records or Parquet files into BigQuery tables
#[derive(Parser, Clone)]
#[command(version)]
struct Args {
    /// Service account key: a path to the key file, or the key JSON itself
    #[arg(long, env = "GCP_SERVICE_ACCOUNT_KEY", hide_env_values = true)]
    service_account_key: Option<String>,

    /// Project for load jobs (defaults to the key's project_id)
    #[arg(long, env = "GCP_PROJECT_ID")]
    project_id: Option<String>,

    /// Default dataset (required for single tenancy)
    #[arg(long, env = "BQ_DATASET_ID")]
    dataset_id: Option<String>,

    /// Job location, e.g. US or europe-west1
    #[arg(long, env = "BQ_LOCATION")]
    location: Option<String>,

    /// single: project and dataset fixed at startup; multi: named per request
    #[arg(long, env = "LOADER_TENANCY", default_value = "single")]
    tenancy: String,

    /// Listen address
    #[arg(long, env = "LOADER_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Name reported by /health
    #[arg(long, env = "LOADER_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    service_name: String,

    /// Maximum request body size in megabytes
    #[arg(long, env = "LOADER_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,

    /// Interval between load job status checks, in milliseconds
    #[arg(long, env = "BQ_POLL_INTERVAL_MS", default_value = "1000")]
    poll_interval_ms: u64,

    /// Override for the BigQuery REST endpoint
    #[arg(long, env = "BQ_API_BASE")]
    api_base: Option<String>,

    /// Override for the BigQuery upload endpoint
    #[arg(long, env = "BQ_UPLOAD_BASE")]
    upload_base: Option<String>,

    /// Directory for rotated log files
    #[arg(long, env = "LOADER_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Log level or filter directives (e.g. "info,bigquery_loader=debug")
    #[arg(long, env = "LOADER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log file format (text, json)
    #[arg(long, env = "LOADER_LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Number of daily log files to keep
    #[arg(long, env = "LOADER_LOG_RETENTION", default_value = "7")]
    log_retention: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let serve_args = ServeArgs {
        service_account_key: args.service_account_key,
        project_id: args.project_id,
        dataset_id: args.dataset_id,
        location: args.location,
        api_base: args.api_base,
        upload_base: args.upload_base,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        tenancy: TenancyMode::parse(&args.tenancy)?,
        bind: args.bind,
        service_name: args.service_name.clone(),
        max_upload_mb: args.max_upload_mb,
        log: LogConfig {
            level: args.log_level,
            directory: args.log_dir,
            file_prefix: args.service_name,
            format: LogFormat::parse(&args.log_format)?,
            retention: args.log_retention,
        },
    };

    if let Err(e) = run_server(serve_args).await {
        tracing::error!(error = %format!("{e:#}"), "service failed");
        return Err(e);
    }
    Ok(())
}
