//! JSON error responses for the HTTP API

use axum::extract::multipart::MultipartError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{RangeError, StorageError};
use crate::server::range::ServeError;

/// Per-request failure, rendered as a JSON body with a matching status
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Recording not found")]
    NotFound,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{error}")]
    RangeNotSatisfiable { error: RangeError, size: u64 },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MissingFile | ApiError::EmptyFile => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound,
            StorageError::EmptyUpload => ApiError::EmptyFile,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(e: ServeError) -> Self {
        match e {
            ServeError::Range { error, size } => ApiError::RangeNotSatisfiable { error, size },
            ServeError::Io(e) => ApiError::Internal(format!("Failed to read recording: {}", e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::NotFound => (status, Json(json!({ "message": self.to_string() }))).into_response(),
            ApiError::RangeNotSatisfiable { size, .. } => {
                tracing::warn!("Rejected range request: {}", self);
                (
                    status,
                    [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response()
            }
            ApiError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                (status, Json(json!({ "error": self.to_string() }))).into_response()
            }
            _ => (status, Json(json!({ "error": self.to_string() }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_status() {
        assert_eq!(ApiError::from(StorageError::NotFound(7)).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StorageError::EmptyUpload).status(), StatusCode::BAD_REQUEST);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(
            ApiError::from(StorageError::Io(io)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unsatisfiable_range_sets_content_range() {
        let err = ApiError::from(ServeError::Range {
            error: RangeError::Unsatisfiable { start: 0, end: 2000, size: 1000 },
            size: 1000,
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }
}
