//! Configuration constants for the loader service
//!
//! This module centralizes the tunable parameters and fixed endpoints used by
//! the warehouse client and the HTTP layer.

use std::time::Duration;

// ============================================================================
// BigQuery Endpoints
// ============================================================================

pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

pub const DEFAULT_UPLOAD_BASE: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// ============================================================================
// Authentication
// ============================================================================

/// Lifetime requested for each signed assertion (Google caps this at one hour)
pub const ASSERTION_VALIDITY: Duration = Duration::from_secs(3600);

/// Cached access tokens are refreshed this long before they expire
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Timeout for each individual HTTP call to Google (token, upload, poll)
///
/// Not a bound on the job itself: the load job is polled until BigQuery reports
/// it done, however long that takes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Load Jobs
// ============================================================================

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub const JOB_ID_PREFIX: &str = "bq-loader";

/// Rows per Arrow batch when tabulating inline JSON records
pub const RECORD_BATCH_SIZE: usize = 8192;

// ============================================================================
// HTTP Service
// ============================================================================

pub const DEFAULT_SERVICE_NAME: &str = "bigquery-loader";

pub const API_PREFIX: &str = "/api/v1/bigquery";

pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;
