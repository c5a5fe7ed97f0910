//! Route handlers.
//!
//! GET  /health
//! POST /api/v1/bigquery/load/json
//! POST /api/v1/bigquery/load/parquet

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::{ApiError, AppState, required};
use crate::formats::JsonRecord;
use crate::loader::LoadOutcome;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/load/json", post(load_json))
        .route("/load/parquet", post(load_parquet))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"status": "ok", "service": state.service_name}))
}

#[derive(Debug, Deserialize)]
struct LoadJsonRequest {
    project_id: Option<String>,
    dataset_id: Option<String>,
    table_name: Option<String>,
    data: Option<Vec<JsonRecord>>,
}

async fn load_json(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LoadOutcome>, ApiError> {
    let request: LoadJsonRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?;

    let mut missing = Vec::new();
    let target = state
        .tenancy
        .target(request.project_id, request.dataset_id, &mut missing);
    let table_name = required(request.table_name, "table_name", &mut missing);
    if request.data.is_none() {
        missing.push("data");
    }

    let (Some((project_id, dataset_id)), Some(table_name), Some(data)) =
        (target, table_name, request.data)
    else {
        return Err(ApiError::missing_fields(&missing));
    };

    let outcome = state
        .loader
        .load_from_records(&project_id, &dataset_id, &table_name, data)
        .await?;
    Ok(Json(outcome))
}

async fn load_parquet(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LoadOutcome>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let mut project_id = None;
    let mut dataset_id = None;
    let mut table_name = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("project_id") => project_id = Some(field.text().await.map_err(multipart_error)?),
            Some("dataset_id") => dataset_id = Some(field.text().await.map_err(multipart_error)?),
            Some("table_name") => table_name = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                upload = Some((stage_upload(field).await?, file_name));
            }
            _ => {}
        }
    }

    let mut missing = Vec::new();
    let target = state.tenancy.target(project_id, dataset_id, &mut missing);
    let table_name = required(table_name, "table_name", &mut missing);
    if upload.is_none() {
        missing.push("file");
    }

    let (Some((project_id, dataset_id)), Some(table_name), Some((upload, file_name))) =
        (target, table_name, upload)
    else {
        return Err(ApiError::missing_fields(&missing));
    };

    // `upload` is dropped, and the staged file deleted, on every path out
    let outcome = state
        .loader
        .load_from_file(
            &project_id,
            &dataset_id,
            &table_name,
            upload.path(),
            file_name.as_deref(),
        )
        .await?;
    Ok(Json(outcome))
}

/// Stream an uploaded file into a temporary file deleted on drop
async fn stage_upload(mut field: Field<'_>) -> Result<NamedTempFile, ApiError> {
    let staged = tempfile::Builder::new()
        .prefix("bq-upload-")
        .suffix(".parquet")
        .tempfile()?;

    let mut file = tokio::fs::File::from_std(staged.reopen()?);
    let mut bytes = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        bytes += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::debug!(path = %staged.path().display(), bytes, "staged upload");
    Ok(staged)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}
