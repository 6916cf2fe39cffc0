//! HTTP API handlers

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::error::RangeError;
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::store::{RecordingRecord, UploadResponse};

/// Name used when the upload part carries no file name
const FALLBACK_UPLOAD_NAME: &str = "recording.webm";

/// `POST /api/recordings`
///
/// The file part is written to disk chunk by chunk as it arrives. Parts
/// without a file name are not uploads and are skipped.
pub async fn upload_recording(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(state.upload_field.as_str()) {
            tracing::debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }
        let Some(file_name) = field.file_name() else {
            tracing::debug!("Ignoring {} field without a file name", state.upload_field);
            continue;
        };
        let name = match file_name.trim() {
            "" => FALLBACK_UPLOAD_NAME.to_string(),
            name => name.to_string(),
        };

        let mut upload = state.store.begin_upload(&name).await?;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(bytes = upload.written(), "Upload {} interrupted: {}", name, e);
                    upload.abort().await;
                    return Err(e.into());
                }
            };
            if let Err(e) = upload.write(&chunk).await {
                upload.abort().await;
                return Err(e.into());
            }
        }

        tracing::info!(bytes = upload.written(), "Received upload {}", name);
        let recording = state.store.commit(upload).await?;
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "Recording uploaded successfully".to_string(),
                recording,
            }),
        ));
    }

    Err(ApiError::MissingFile)
}

/// `GET /api/recordings`, newest first
pub async fn list_recordings(State(state): State<Arc<AppState>>) -> Json<Vec<RecordingRecord>> {
    Json(state.store.list().await)
}

/// `GET /api/recordings/:id`, whole file or a single byte range
pub async fn stream_recording(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // Ids that cannot name a record are simply unknown
    let id: u64 = id.parse().map_err(|_| ApiError::NotFound)?;
    let recording = state.store.get(id).await?;

    let range = match headers.get(header::RANGE) {
        Some(value) => Some(value.to_str().map_err(|_| ApiError::RangeNotSatisfiable {
            error: RangeError::Malformed("non-ASCII range header".to_string()),
            size: recording.filesize,
        })?),
        None => None,
    };

    let response = state
        .streamer
        .serve(std::path::Path::new(&recording.filepath), range)
        .await?;
    Ok(response)
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
