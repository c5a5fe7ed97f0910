//! Load orchestration: tabulate the payload, reject empty input, replace the
//! destination table and report what happened.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::LoadError;
use crate::formats::{Dataset, JsonRecord, read_parquet_file, records_to_dataset};
use crate::warehouse::{TableRef, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Success,
    Warning,
    Error,
}

/// Result of one load request, serialized as the response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    pub status: LoadStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl LoadOutcome {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: LoadStatus::Warning,
            message: message.into(),
            rows: None,
            elapsed_secs: None,
            job_id: None,
        }
    }

    fn success(destination: &TableRef, rows: u64, elapsed_secs: f64, job_id: String) -> Self {
        Self {
            status: LoadStatus::Success,
            message: format!("load complete: {destination} ({rows} records, {elapsed_secs:.1}s)"),
            rows: Some(rows),
            elapsed_secs: Some(elapsed_secs),
            job_id: Some(job_id),
        }
    }
}

/// Runs loads against a shared warehouse handle
#[derive(Clone)]
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
}

impl Loader {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Replace `project_id.dataset_id.table_name` with the given records.
    ///
    /// Columns are the union of keys across records and rows keep their input
    /// order. An empty result is a warning and the warehouse is not contacted.
    pub async fn load_from_records(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_name: &str,
        records: Vec<JsonRecord>,
    ) -> Result<LoadOutcome, LoadError> {
        let start = Instant::now();
        let destination = TableRef::new(project_id, dataset_id, table_name)?;

        let decode_error = |cause: anyhow::Error| LoadError::Decode {
            input: "records".to_string(),
            cause,
        };
        let dataset = tokio::task::spawn_blocking(move || records_to_dataset(records))
            .await
            .map_err(|e| decode_error(e.into()))?
            .map_err(|e| {
                tracing::error!(table = %table_name, error = %format!("{e:#}"), "failed to tabulate records");
                decode_error(e)
            })?;

        if dataset.is_empty() {
            tracing::warn!(table = %table_name, "no data to load");
            return Ok(LoadOutcome::warning(format!("no data to load for {table_name}")));
        }

        self.load_dataset(&destination, dataset, start).await
    }

    /// Replace `project_id.dataset_id.table_name` with the contents of a
    /// Parquet file. A file without rows is a warning.
    ///
    /// `file_name` is the name the caller knows the file by (an upload's
    /// client-side name); messages fall back to `file_path` without one.
    pub async fn load_from_file(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_name: &str,
        file_path: &Path,
        file_name: Option<&str>,
    ) -> Result<LoadOutcome, LoadError> {
        let start = Instant::now();
        let destination = TableRef::new(project_id, dataset_id, table_name)?;
        let label = file_name
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_path.display().to_string());

        let dataset = match read_parquet_file(file_path).await {
            Ok(dataset) => dataset,
            Err(e) => {
                tracing::error!(
                    file = %label,
                    path = %file_path.display(),
                    error = %format!("{e:#}"),
                    "failed to read Parquet file"
                );
                return Err(LoadError::Decode {
                    input: label,
                    cause: e,
                });
            }
        };

        if dataset.is_empty() {
            tracing::warn!(file = %label, path = %file_path.display(), "empty file");
            return Ok(LoadOutcome::warning(format!("empty file: {label}")));
        }

        self.load_dataset(&destination, dataset, start).await
    }

    async fn load_dataset(
        &self,
        destination: &TableRef,
        dataset: Dataset,
        start: Instant,
    ) -> Result<LoadOutcome, LoadError> {
        let rows = dataset.num_rows() as u64;

        let job = match self.warehouse.replace_table(destination, dataset).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(
                    destination = %destination,
                    error = %format!("{e:#}"),
                    "load failed"
                );
                return Err(LoadError::Warehouse {
                    destination: destination.to_string(),
                    cause: e,
                });
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        if let Some(output_rows) = job.output_rows.filter(|n| *n != rows) {
            tracing::warn!(
                destination = %destination,
                rows,
                output_rows,
                "warehouse reported a different row count"
            );
        }
        tracing::info!(
            destination = %destination,
            job_id = %job.job_id,
            rows,
            elapsed_secs = elapsed,
            "load complete"
        );

        Ok(LoadOutcome::success(destination, rows, elapsed, job.job_id))
    }
}
