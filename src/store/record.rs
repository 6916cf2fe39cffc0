//! Persisted recording metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata row for one uploaded recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRecord {
    /// Server-assigned, strictly increasing
    pub id: u64,
    /// Stored file name
    pub filename: String,
    /// Location of the stored file
    pub filepath: String,
    /// Size in bytes
    pub filesize: u64,
    pub created_at: DateTime<Utc>,
}

impl RecordingRecord {
    /// Parse and validate one index line
    pub fn from_index_line(line: &str) -> Result<Self, String> {
        let record: Self = serde_json::from_str(line).map_err(|e| e.to_string())?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("id must be positive".to_string());
        }
        if self.filename.is_empty() {
            return Err("filename is empty".to_string());
        }
        if self.filepath.is_empty() {
            return Err("filepath is empty".to_string());
        }
        Ok(())
    }
}

/// Body of a successful `POST /api/recordings`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub recording: RecordingRecord,
}
