//! BigQuery load jobs over the REST API.
//!
//! A dataset is encoded to Parquet and sent as a `multipart/related` media
//! upload that creates a load job with `WRITE_TRUNCATE`. The job is then
//! polled until BigQuery reports it done. Truncation happens inside the job,
//! so a failed job leaves the previous table contents untouched.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use derive_builder::Builder;
use reqwest::{Response, header};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use super::job::{ApiErrorResponse, Job, JobConfiguration, JobConfigurationLoad, JobReference};
use super::{LoadJob, TableRef, TokenSource, Warehouse};
use crate::config::{
    DEFAULT_API_BASE, DEFAULT_POLL_INTERVAL, DEFAULT_UPLOAD_BASE, JOB_ID_PREFIX, REQUEST_TIMEOUT,
};
use crate::formats::Dataset;

#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct BigQueryArgs {
    /// Project that owns (and is billed for) the load jobs
    #[builder(setter(into))]
    project_id: String,
    /// Job location, e.g. `US` or `europe-west1`
    #[builder(setter(into, strip_option), default)]
    location: Option<String>,
    #[builder(setter(into), default = "DEFAULT_API_BASE.to_string()")]
    api_base: String,
    #[builder(setter(into), default = "DEFAULT_UPLOAD_BASE.to_string()")]
    upload_base: String,
    #[builder(default = "DEFAULT_POLL_INTERVAL")]
    poll_interval: Duration,
}

impl BigQueryArgsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(project_id) = &self.project_id {
            if project_id.trim().is_empty() {
                return Err("project_id must not be empty".to_string());
            }
        }
        for base in [&self.api_base, &self.upload_base].into_iter().flatten() {
            Url::parse(base).map_err(|e| format!("invalid base URL '{base}': {e}"))?;
        }
        Ok(())
    }
}

pub struct BigQueryClient {
    args: BigQueryArgs,
    tokens: Arc<dyn TokenSource>,
    http: reqwest::Client,
}

impl BigQueryClient {
    pub fn new(args: BigQueryArgs, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { args, tokens, http })
    }

    fn job_id() -> String {
        format!("{JOB_ID_PREFIX}-{}", Uuid::new_v4())
    }

    /// Delimiter for a single upload body, never reused
    fn multipart_boundary() -> String {
        format!("{JOB_ID_PREFIX}-{}", Uuid::new_v4().simple())
    }

    async fn insert_job(&self, destination: &TableRef, job_id: &str, parquet: Bytes) -> Result<Job> {
        let job = Job {
            job_reference: JobReference {
                project_id: self.args.project_id.clone(),
                job_id: job_id.to_string(),
                location: self.args.location.clone(),
            },
            configuration: Some(JobConfiguration {
                load: JobConfigurationLoad::replace_with_parquet(destination),
            }),
            status: None,
            statistics: None,
        };
        let metadata = serde_json::to_vec(&job).context("Failed to serialize job configuration")?;

        let url = format!(
            "{}/projects/{}/jobs?uploadType=multipart",
            self.args.upload_base.trim_end_matches('/'),
            self.args.project_id
        );
        let token = self.tokens.access_token().await?;
        let boundary = Self::multipart_boundary();

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(multipart_related(&boundary, &metadata, &parquet))
            .send()
            .await
            .context("Load job upload request failed")?;

        parse_job(response).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        let url = format!(
            "{}/projects/{}/jobs/{}",
            self.args.api_base.trim_end_matches('/'),
            self.args.project_id,
            job_id
        );
        let token = self.tokens.access_token().await?;

        let mut request = self.http.get(&url).bearer_auth(token);
        if let Some(location) = &self.args.location {
            request = request.query(&[("location", location)]);
        }

        let response = request.send().await.context("Job status request failed")?;
        parse_job(response).await
    }

    async fn wait_for_job(&self, mut job: Job) -> Result<Job> {
        loop {
            if let Some(status) = job.status.as_ref().filter(|s| s.is_done()) {
                if let Some(failure) = status.failure() {
                    bail!("job {} failed: {}", job.job_reference.job_id, failure);
                }
                return Ok(job);
            }

            tracing::debug!(
                job_id = %job.job_reference.job_id,
                state = job.status.as_ref().map(|s| s.state.as_str()).unwrap_or("PENDING"),
                "waiting for load job"
            );
            tokio::time::sleep(self.args.poll_interval).await;
            job = self.get_job(&job.job_reference.job_id).await?;
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn replace_table(&self, destination: &TableRef, dataset: Dataset) -> Result<LoadJob> {
        let rows = dataset.num_rows();
        let parquet = tokio::task::spawn_blocking(move || dataset.to_parquet_bytes())
            .await
            .context("Parquet encoding task failed")??;

        let job_id = Self::job_id();
        tracing::info!(
            job_id = %job_id,
            destination = %destination,
            rows,
            bytes = parquet.len(),
            "submitting load job"
        );

        let job = self.insert_job(destination, &job_id, parquet).await?;
        let job = self.wait_for_job(job).await?;

        Ok(LoadJob {
            output_rows: job.output_rows(),
            job_id: job.job_reference.job_id,
        })
    }
}

fn multipart_related(boundary: &str, metadata: &[u8], media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + media.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn parse_job(response: Response) -> Result<Job> {
    let status = response.status();
    let body = response.bytes().await.context("Failed to read BigQuery response")?;

    if !status.is_success() {
        let message = match serde_json::from_slice::<ApiErrorResponse>(&body) {
            Ok(err) => format!("{} {}", err.error.code, err.error.message),
            Err(_) => String::from_utf8_lossy(&body).into_owned(),
        };
        return Err(anyhow!("BigQuery returned {status}: {message}"));
    }

    serde_json::from_slice(&body).context("Failed to parse BigQuery job resource")
}
