//! Error responses for the HTTP layer.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::LoadError;
use crate::loader::LoadStatus;

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub status: LoadStatus,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::bad_request(format!("missing required fields: {}", fields.join(", ")))
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        let status = match &err {
            LoadError::Validation(_) | LoadError::Decode { .. } => StatusCode::BAD_REQUEST,
            LoadError::Warehouse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!(error = %err, "failed to stage upload");
        Self::internal(format!("failed to stage upload: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            status: LoadStatus::Error,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
