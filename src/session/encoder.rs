//! Chunked encoder seam
//!
//! The encoder itself (a platform media recorder) lives outside this crate.
//! It receives the composite stream, emits chunks every timeslice through
//! an [`EncoderSink`], and reports completion once asked to stop.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::CaptureConfig;
use crate::constants::RECORDER_MIME_TYPE;
use crate::error::CaptureError;
use crate::media::CompositeStream;
use crate::session::machine::SessionEvent;

/// Parameters the encoder is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub mime_type: String,
    /// How often a chunk is emitted while recording
    pub timeslice: Duration,
}

impl EncoderSettings {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            mime_type: RECORDER_MIME_TYPE.to_string(),
            timeslice: config.timeslice(),
        }
    }
}

/// A chunked media encoder
pub trait ChunkEncoder: Send {
    /// Begin encoding `stream`. Chunks and completion go to `sink`.
    fn start(
        &mut self,
        stream: &CompositeStream,
        settings: &EncoderSettings,
        sink: EncoderSink,
    ) -> Result<(), CaptureError>;

    /// Request a flush. The encoder delivers any remaining data, then calls
    /// [`EncoderSink::flushed`]. Calling it twice must be harmless.
    fn stop(&mut self);
}

/// Where an encoder reports chunks, completion and failure
#[derive(Debug, Clone)]
pub struct EncoderSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EncoderSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn chunk(&self, data: Bytes) {
        let _ = self.tx.send(SessionEvent::ChunkAvailable(data));
    }

    pub fn flushed(&self) {
        let _ = self.tx.send(SessionEvent::EncoderFlushed);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        let _ = self.tx.send(SessionEvent::EncoderFailed(reason.into()));
    }
}
