//! Error types for the screen recorder

use thiserror::Error;

use crate::media::SourceKind;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-side capture errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("{kind} capture denied: {reason}")]
    AcquisitionDenied { kind: SourceKind, reason: String },

    #[error("{kind} capture produced no usable track")]
    NoTracks { kind: SourceKind },

    #[error("Encoder failure: {0}")]
    EncoderFailure(String),

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: &'static str, action: &'static str },

    #[error("Capture abandoned before completion")]
    Abandoned,

    #[error("Audio device error: {0}")]
    Device(String),
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        CaptureError::Device(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        CaptureError::Device(e.to_string())
    }
}

/// Server-side recording storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Recording not found: {0}")]
    NotFound(u64),

    #[error("Upload contained no data")]
    EmptyUpload,

    #[error("Storage IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index entry at line {line}: {reason}")]
    CorruptIndex { line: usize, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Upload transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected server response: {0}")]
    InvalidResponse(String),
}

/// Byte-range request errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Malformed range header: {0}")]
    Malformed(String),

    #[error("Range {start}-{end} not satisfiable for {size} bytes")]
    Unsatisfiable { start: u64, end: u64, size: u64 },

    #[error("Multiple ranges are not supported")]
    MultipleRanges,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
