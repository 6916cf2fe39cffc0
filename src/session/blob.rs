//! Chunk accumulation and the finished recording blob

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::constants::RECORDING_MEDIA_TYPE;

/// Ordered encoder output for one recording episode.
///
/// Insertion order is temporal order; chunks are never reordered.
#[derive(Debug, Default)]
pub struct ChunkSequence {
    chunks: Vec<Bytes>,
    total_bytes: u64,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are ignored and return false.
    pub fn push(&mut self, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len() as u64;
        self.chunks.push(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// Concatenate all chunks in order and empty the sequence
    pub fn take_blob(&mut self) -> RecordingBlob {
        let mut data = BytesMut::with_capacity(self.total_bytes as usize);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk);
        }
        let blob = RecordingBlob {
            data: data.freeze(),
            chunk_count: self.chunks.len(),
            created_at: Utc::now(),
        };
        self.clear();
        blob
    }
}

/// Finished recording, immutable once produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingBlob {
    data: Bytes,
    chunk_count: usize,
    created_at: DateTime<Utc>,
}

impl RecordingBlob {
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn media_type(&self) -> &'static str {
        RECORDING_MEDIA_TYPE
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Default file name for saving or uploading, e.g. `recording_1712345678901.webm`
    pub fn suggested_file_name(&self) -> String {
        format!("recording_{}.webm", self.created_at.timestamp_millis())
    }

    /// Write the recording to a local file. The blob stays usable.
    pub async fn save_to(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, &self.data).await?;
        tracing::info!(bytes = self.len(), "Recording saved to {:?}", path);
        Ok(())
    }
}
