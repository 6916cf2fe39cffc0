//! # Screen Recorder
//!
//! Screen + microphone capture sessions on the client, and a recording
//! store with seekable byte-range playback on the server.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── CLIENT ─────────────────────────────┐
//! │  ┌──────────────┐   ┌──────────────┐                             │
//! │  │   Display    │   │  Microphone  │   media::acquirer           │
//! │  └──────┬───────┘   └──────┬───────┘                             │
//! │         └────────┬─────────┘                                     │
//! │                  ▼                                               │
//! │        ┌───────────────────┐   video from display,              │
//! │        │ CompositeStream   │   audio from microphone            │
//! │        └─────────┬─────────┘   media::composite                 │
//! │                  ▼                                               │
//! │        ┌───────────────────┐   chunks every 250 ms,             │
//! │        │  CaptureSession   │   1 s ticker, 180 s limit          │
//! │        └─────────┬─────────┘   session::{machine, driver}       │
//! │                  ▼                                               │
//! │        ┌───────────────────┐                                     │
//! │        │  RecordingBlob    │──► UploadClient (transfer)          │
//! │        └───────────────────┘                                     │
//! └──────────────────────────────────┼───────────────────────────────┘
//!                                    │ multipart POST /api/recordings
//!                                    ▼
//! ┌──────────────────────────── SERVER ─────────────────────────────┐
//! │  ┌───────────────────┐       ┌──────────────────────────────┐   │
//! │  │  axum router      │──────►│ RecordingStore (files +      │   │
//! │  │  server::handlers │       │ JSON-lines metadata index)   │   │
//! │  └─────────┬─────────┘       └──────────────────────────────┘   │
//! │            ▼                                                     │
//! │  ┌───────────────────┐   GET /api/recordings/:id                │
//! │  │  RangeStreamer    │   200 whole file / 206 byte range        │
//! │  └───────────────────┘                                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod session;
pub mod store;
pub mod transfer;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Hard ceiling on a single capture session
    pub const MAX_RECORDING_SECS: u32 = 180;

    /// Interval at which the encoder emits chunks
    pub const DEFAULT_TIMESLICE_MS: u64 = 250;

    /// Requested display capture frame rate
    pub const DEFAULT_FRAME_RATE: u32 = 30;

    /// Default HTTP port for the recording server
    pub const DEFAULT_HTTP_PORT: u16 = 5000;

    /// Largest accepted upload body (1 GiB)
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

    /// Multipart field carrying the uploaded recording
    pub const UPLOAD_FIELD_NAME: &str = "video";

    /// Media type of stored and served recordings
    pub const RECORDING_MEDIA_TYPE: &str = "video/webm";

    /// Container and codecs requested from the encoder
    pub const RECORDER_MIME_TYPE: &str = "video/webm;codecs=vp9,opus";

    /// Read size when streaming a file or range
    pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;
}
