//! HTTP boundary: request parsing, tenancy and error mapping.

pub mod error;
pub mod routes;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::API_PREFIX;
use crate::loader::Loader;

pub use error::ApiError;

/// Where the destination project and dataset come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tenancy {
    /// Bound at startup; identifiers in requests are ignored
    Single {
        project_id: String,
        dataset_id: String,
    },
    /// Every request names its own project and dataset
    Multi,
}

impl Tenancy {
    /// Pick the project and dataset for a request.
    ///
    /// Names of missing fields are appended to `missing`. Blank values count
    /// as missing.
    pub fn target(
        &self,
        project_id: Option<String>,
        dataset_id: Option<String>,
        missing: &mut Vec<&'static str>,
    ) -> Option<(String, String)> {
        match self {
            Tenancy::Single {
                project_id: bound_project,
                dataset_id: bound_dataset,
            } => {
                if project_id.is_some() || dataset_id.is_some() {
                    tracing::debug!("ignoring request identifiers in single tenancy");
                }
                Some((bound_project.clone(), bound_dataset.clone()))
            }
            Tenancy::Multi => {
                let project_id = required(project_id, "project_id", missing);
                let dataset_id = required(dataset_id, "dataset_id", missing);
                project_id.zip(dataset_id)
            }
        }
    }
}

/// Keep a non-blank value, or record `name` as missing
pub(crate) fn required(
    value: Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    let value = value.filter(|v| !v.trim().is_empty());
    if value.is_none() {
        missing.push(name);
    }
    value
}

pub struct AppState {
    pub loader: Loader,
    pub tenancy: Tenancy,
    pub service_name: String,
}

/// Build the service router. `max_upload_bytes` bounds every request body.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest(API_PREFIX, routes::routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
