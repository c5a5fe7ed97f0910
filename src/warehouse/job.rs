//! The subset of BigQuery REST job resources used by load jobs.
//!
//! See <https://cloud.google.com/bigquery/docs/reference/rest/v2/Job>.

use serde::{Deserialize, Serialize};

use super::TableRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_reference: JobReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<JobConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<JobStatistics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    pub load: JobConfigurationLoad,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    pub destination_table: TableReference,
    pub source_format: String,
    pub write_disposition: String,
    pub create_disposition: String,
}

impl JobConfigurationLoad {
    /// Parquet upload that replaces the destination, creating it if missing
    pub fn replace_with_parquet(destination: &TableRef) -> Self {
        Self {
            destination_table: TableReference::from(destination),
            source_format: "PARQUET".to_string(),
            write_disposition: "WRITE_TRUNCATE".to_string(),
            create_disposition: "CREATE_IF_NEEDED".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl From<&TableRef> for TableReference {
    fn from(table: &TableRef) -> Self {
        Self {
            project_id: table.project_id().to_string(),
            dataset_id: table.dataset_id().to_string(),
            table_id: table.table_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// PENDING, RUNNING or DONE
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        self.state == "DONE"
    }

    /// Describe a failed job, or `None` if it succeeded.
    pub fn failure(&self) -> Option<String> {
        let result = self.error_result.as_ref()?;
        let mut message = format!("{} ({})", result.message, result.reason);

        let details: Vec<&str> = self
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty() && *m != result.message)
            .collect();
        if !details.is_empty() {
            message.push_str(": ");
            message.push_str(&details.join("; "));
        }
        Some(message)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadStatistics>,
}

/// int64 counters are encoded as JSON strings by the REST API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_rows: Option<String>,
}

impl Job {
    pub fn output_rows(&self) -> Option<u64> {
        self.statistics
            .as_ref()?
            .load
            .as_ref()?
            .output_rows
            .as_deref()?
            .parse()
            .ok()
    }
}

/// Error envelope returned by Google APIs on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
