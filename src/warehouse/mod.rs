//! Warehouse abstraction and the BigQuery implementation

pub mod auth;
pub mod bigquery;
pub mod job;
#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::error::LoadError;
use crate::formats::Dataset;

pub use auth::{ServiceAccountTokenSource, TokenSource};
pub use bigquery::{BigQueryArgsBuilder, BigQueryClient};

/// Fully qualified destination table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    project_id: String,
    dataset_id: String,
    table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Result<Self, LoadError> {
        let table = Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        };

        for (name, value) in [
            ("project_id", &table.project_id),
            ("dataset_id", &table.dataset_id),
            ("table_name", &table.table_id),
        ] {
            if value.trim().is_empty() {
                return Err(LoadError::validation(format!("{name} must not be empty")));
            }
        }

        Ok(table)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// A finished load job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub job_id: String,
    /// Rows the warehouse reports as written, when it reports them
    pub output_rows: Option<u64>,
}

/// Destination that can atomically replace a table with a dataset.
///
/// The table is created if missing. On success its contents are exactly the
/// rows of `dataset`, in order; on failure the previous contents are intact.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn replace_table(&self, destination: &TableRef, dataset: Dataset) -> Result<LoadJob>;
}
