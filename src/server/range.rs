//! Byte-range streaming of stored recordings
//!
//! Each request opens its own file handle, seeks to the start of its window
//! and streams the window in fixed-size reads, so concurrent seeks against
//! the same recording never share state or buffer the whole file.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::constants::{RECORDING_MEDIA_TYPE, STREAM_CHUNK_SIZE};
use crate::error::RangeError;

/// Inclusive byte window `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a resource of `total` bytes
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parse a `Range` header against a resource of `size` bytes.
///
/// Accepts `bytes=start-end`, `bytes=start-` and `bytes=-suffix`. Bounds
/// outside the resource are rejected, never clamped, except that a suffix
/// longer than the resource selects all of it.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let malformed = || RangeError::Malformed(header.to_string());

    let set = header.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    if set.contains(',') {
        return Err(RangeError::MultipleRanges);
    }
    let (first, last) = set.split_once('-').ok_or_else(malformed)?;
    let (first, last) = (first.trim(), last.trim());
    let number = |s: &str| s.parse::<u64>().map_err(|_| malformed());

    let (start, end) = if first.is_empty() {
        let suffix = number(last)?;
        if suffix == 0 || size == 0 {
            return Err(RangeError::Unsatisfiable { start: size, end: size, size });
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let start = number(first)?;
        let end = if last.is_empty() {
            match size.checked_sub(1) {
                Some(end) => end,
                None => return Err(RangeError::Unsatisfiable { start, end: start, size }),
            }
        } else {
            number(last)?
        };
        (start, end)
    };

    if start > end || end >= size {
        return Err(RangeError::Unsatisfiable { start, end, size });
    }
    Ok(ByteRange { start, end })
}

/// Failure while serving a recording
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("{error}")]
    Range { error: RangeError, size: u64 },

    #[error("Failed to read recording: {0}")]
    Io(#[from] io::Error),
}

/// Serves stored files, whole or by byte range
#[derive(Debug, Clone)]
pub struct RangeStreamer {
    media_type: &'static str,
    chunk_size: usize,
}

impl Default for RangeStreamer {
    fn default() -> Self {
        Self::new(RECORDING_MEDIA_TYPE, STREAM_CHUNK_SIZE)
    }
}

impl RangeStreamer {
    pub fn new(media_type: &'static str, chunk_size: usize) -> Self {
        Self {
            media_type,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Build a 200 (no range) or 206 response streaming from `path`
    pub async fn serve(&self, path: &Path, range: Option<&str>) -> Result<Response, ServeError> {
        let mut file = File::open(path).await?;
        let size = file.metadata().await?.len();

        let Some(header) = range else {
            tracing::debug!(size, "Serving full recording {:?}", path);
            let body = Body::from_stream(read_window(file, size, self.chunk_size));
            return Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, self.media_type.to_string()),
                    (header::CONTENT_LENGTH, size.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response());
        };

        let window = parse_range(header, size).map_err(|error| ServeError::Range { error, size })?;
        file.seek(SeekFrom::Start(window.start)).await?;

        tracing::debug!(start = window.start, end = window.end, size, "Serving range of {:?}", path);
        let body = Body::from_stream(read_window(file, window.len(), self.chunk_size));
        Ok((
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, self.media_type.to_string()),
                (header::CONTENT_LENGTH, window.len().to_string()),
                (header::CONTENT_RANGE, window.content_range(size)),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response())
    }
}

/// Stream exactly `len` bytes from the current position of `file`
pub fn read_window(
    file: File,
    len: u64,
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::unfold((file, len), move |(mut file, remaining)| async move {
        if remaining == 0 {
            return None;
        }

        let want = remaining.min(chunk_size as u64) as usize;
        let mut buf = BytesMut::zeroed(want);
        match file.read(&mut buf).await {
            Ok(0) => {
                let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "recording shorter than its window");
                Some((Err(eof), (file, 0)))
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf.freeze()), (file, remaining - n as u64)))
            }
            Err(e) => Some((Err(e), (file, 0))),
        }
    })
}
