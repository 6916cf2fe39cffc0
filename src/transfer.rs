//! Upload of finished recordings to the recording server
//!
//! One multipart request per upload. Failures are reported once and the
//! blob is left untouched so the caller can retry.

use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::config::UploadConfig;
use crate::constants::RECORDING_MEDIA_TYPE;
use crate::error::TransferError;
use crate::session::RecordingBlob;
use crate::store::{RecordingRecord, UploadResponse};

/// HTTP client for the recording API
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: reqwest::Client,
    base_url: String,
    field_name: String,
}

impl UploadClient {
    pub fn new(config: &UploadConfig) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            field_name: config.field_name.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL a player can seek against for recording `id`
    pub fn stream_url(&self, id: u64) -> String {
        format!("{}/api/recordings/{}", self.base_url, id)
    }

    /// Send `blob` as `name`. Each successful call creates a new record.
    pub async fn upload(&self, blob: &RecordingBlob, name: &str) -> Result<RecordingRecord, TransferError> {
        let part = Part::stream_with_length(blob.bytes().clone(), blob.len() as u64)
            .file_name(name.to_string())
            .mime_str(RECORDING_MEDIA_TYPE)?;
        let form = Form::new().part(self.field_name.clone(), part);

        tracing::info!(bytes = blob.len(), "Uploading {} to {}", name, self.base_url);

        let response = self
            .client
            .post(format!("{}/api/recordings", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Upload rejected: {}", body);
            return Err(TransferError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| TransferError::InvalidResponse(e.to_string()))?;

        tracing::info!(id = uploaded.recording.id, "{}", uploaded.message);
        Ok(uploaded.recording)
    }

    /// Recordings known to the server, newest first
    pub async fn list_recordings(&self) -> Result<Vec<RecordingRecord>, TransferError> {
        let response = self
            .client
            .get(format!("{}/api/recordings", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransferError::InvalidResponse(e.to_string()))
    }
}
