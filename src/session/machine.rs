//! Capture session state machine
//!
//! ```text
//!   Idle ──start──▶ Acquiring ──sources ready──▶ Recording ──user stop────────┐
//!    ▲                  │                          │  ▲  ├──180 s reached────┤
//!    │            acquisition                 chunk│  │  └──track ended──────┤
//!    │              failed                         └──┘                      ▼
//!    │                  ▼                                                Stopping
//!    └──discard── Failed(error) ◀──────────── encoder failed ──────────────┤
//!    └──discard── Ready(blob)   ◀──────────── encoder flushed ─────────────┘
//! ```
//!
//! Every transition out of `Recording`/`Stopping` stops all tracks the
//! session holds. Stop triggers arriving after the first one are ignored.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::media::{AcquiredSources, CompositeStream, CompositeStreamBuilder, MediaTrack};
use crate::session::blob::{ChunkSequence, RecordingBlob};

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Encoder produced a chunk
    ChunkAvailable(Bytes),
    /// One second of recording elapsed
    Tick,
    /// User asked to stop
    UserStop,
    /// A source track was terminated outside the session
    TrackEnded(Uuid),
    /// Encoder delivered its final data
    EncoderFlushed,
    /// Encoder gave up
    EncoderFailed(String),
}

/// Why a recording left the `Recording` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    User,
    TimeLimit,
    TrackEnded,
}

/// Current state, with the data each terminal state carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Recording,
    Stopping(StopReason),
    Ready(RecordingBlob),
    Failed(CaptureError),
}

/// State discriminant, cheap to copy and serialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Ready,
    Failed,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Acquiring => SessionPhase::Acquiring,
            SessionState::Recording => SessionPhase::Recording,
            SessionState::Stopping(_) => SessionPhase::Stopping,
            SessionState::Ready(_) => SessionPhase::Ready,
            SessionState::Failed(_) => SessionPhase::Failed,
        }
    }
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Acquiring => "acquiring",
            SessionPhase::Recording => "recording",
            SessionPhase::Stopping => "stopping",
            SessionPhase::Ready => "ready",
            SessionPhase::Failed => "failed",
        }
    }

    /// Holds hardware or an encoder run
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionPhase::Acquiring | SessionPhase::Recording | SessionPhase::Stopping
        )
    }
}

/// What the driver must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Ask the encoder to flush and finish
    StopEncoder,
}

/// Snapshot for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub elapsed_secs: u32,
    /// `MM:SS`
    pub elapsed: String,
    pub max_duration_secs: u32,
    pub chunk_count: usize,
    pub buffered_bytes: u64,
    pub live_tracks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Format seconds as `MM:SS`
pub fn format_elapsed(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// One capture session: state, elapsed counter, chunks and held tracks
pub struct CaptureSession {
    id: Uuid,
    state: SessionState,
    max_duration_secs: u32,
    elapsed_secs: u32,
    chunks: ChunkSequence,
    tracks: Vec<Arc<MediaTrack>>,
    composite: Option<CompositeStream>,
    builder: CompositeStreamBuilder,
    last_stop: Option<StopReason>,
}

impl CaptureSession {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            max_duration_secs: config.max_duration_secs,
            elapsed_secs: 0,
            chunks: ChunkSequence::new(),
            tracks: Vec::new(),
            composite: None,
            builder: CompositeStreamBuilder::new(config.keep_display_audio),
            last_stop: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.chunks.total_bytes()
    }

    pub fn composite(&self) -> Option<&CompositeStream> {
        self.composite.as_ref()
    }

    /// Tracks still held by the session
    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    pub fn blob(&self) -> Option<&RecordingBlob> {
        match &self.state {
            SessionState::Ready(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match &self.state {
            SessionState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// `Idle → Acquiring`
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.phase() != SessionPhase::Idle {
            return Err(self.invalid("start"));
        }

        self.id = Uuid::new_v4();
        self.elapsed_secs = 0;
        self.chunks.clear();
        self.last_stop = None;
        self.state = SessionState::Acquiring;

        tracing::info!(session = %self.id, "Acquiring capture sources");
        Ok(())
    }

    /// `Acquiring → Recording`: take ownership of both sources and build
    /// the composite stream for the encoder.
    ///
    /// If the composite cannot be built the session fails and every track
    /// of both sources is stopped.
    pub fn sources_ready(&mut self, sources: AcquiredSources) -> Result<CompositeStream, CaptureError> {
        if self.phase() != SessionPhase::Acquiring {
            sources.stop_all();
            return Err(self.invalid("attach sources"));
        }

        self.tracks = sources
            .display
            .tracks()
            .iter()
            .chain(sources.microphone.tracks())
            .cloned()
            .collect();

        match self.builder.build(&sources.display, &sources.microphone) {
            Ok(composite) => {
                self.elapsed_secs = 0;
                self.chunks.clear();
                self.composite = Some(composite.clone());
                self.state = SessionState::Recording;

                tracing::info!(
                    session = %self.id,
                    composite = %composite.id(),
                    max_secs = self.max_duration_secs,
                    "Recording started"
                );
                Ok(composite)
            }
            Err(e) => {
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// `Acquiring → Failed`
    pub fn acquisition_failed(&mut self, error: CaptureError) {
        if self.phase() == SessionPhase::Acquiring {
            self.fail(error);
        } else {
            tracing::warn!(session = %self.id, state = self.phase().name(), "Late acquisition failure ignored: {}", error);
        }
    }

    /// Apply one event. Events that make no sense in the current state are ignored.
    pub fn handle(&mut self, event: SessionEvent) -> Effect {
        use SessionEvent::*;

        match (self.phase(), event) {
            (SessionPhase::Recording | SessionPhase::Stopping, ChunkAvailable(data)) => {
                let size = data.len();
                if self.chunks.push(data) {
                    tracing::debug!(session = %self.id, size, chunks = self.chunks.len(), "Chunk appended");
                }
                Effect::None
            }
            (SessionPhase::Recording, Tick) => {
                self.elapsed_secs += 1;
                if self.elapsed_secs >= self.max_duration_secs {
                    self.begin_stop(StopReason::TimeLimit)
                } else {
                    Effect::None
                }
            }
            (SessionPhase::Recording, UserStop) => self.begin_stop(StopReason::User),
            (SessionPhase::Recording, TrackEnded(track_id)) if self.holds_track(track_id) => {
                self.begin_stop(StopReason::TrackEnded)
            }
            (SessionPhase::Recording | SessionPhase::Stopping, EncoderFlushed) => {
                self.finish();
                Effect::None
            }
            (SessionPhase::Recording | SessionPhase::Stopping, EncoderFailed(reason)) => {
                self.fail(CaptureError::EncoderFailure(reason));
                Effect::None
            }
            (phase, event) => {
                tracing::debug!(session = %self.id, state = phase.name(), ?event, "Event ignored");
                Effect::None
            }
        }
    }

    /// `Ready | Failed → Idle`, handing back the blob if there was one
    pub fn discard(&mut self) -> Result<Option<RecordingBlob>, CaptureError> {
        match self.phase() {
            SessionPhase::Idle => Ok(None),
            SessionPhase::Ready | SessionPhase::Failed => {
                let previous = std::mem::replace(&mut self.state, SessionState::Idle);
                self.elapsed_secs = 0;
                self.last_stop = None;
                tracing::info!(session = %self.id, "Session discarded");
                Ok(match previous {
                    SessionState::Ready(blob) => Some(blob),
                    _ => None,
                })
            }
            _ => Err(self.invalid("discard")),
        }
    }

    /// Fail an active session whose driver went away
    pub fn abandon(&mut self) {
        if self.phase().is_active() {
            self.fail(CaptureError::Abandoned);
        }
    }

    /// Move to `Failed`, releasing everything
    pub fn fail(&mut self, error: CaptureError) {
        tracing::warn!(session = %self.id, state = self.phase().name(), "Capture session failed: {}", error);
        self.release_tracks();
        self.chunks.clear();
        self.composite = None;
        self.state = SessionState::Failed(error);
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            phase: self.phase(),
            elapsed_secs: self.elapsed_secs,
            elapsed: format_elapsed(self.elapsed_secs),
            max_duration_secs: self.max_duration_secs,
            chunk_count: self.chunks.len(),
            buffered_bytes: self.chunks.total_bytes(),
            live_tracks: self.live_tracks(),
            stop_reason: self.last_stop,
            error: self.error().map(|e| e.to_string()),
        }
    }

    fn begin_stop(&mut self, reason: StopReason) -> Effect {
        tracing::info!(session = %self.id, ?reason, elapsed = self.elapsed_secs, "Stopping recording");
        self.state = SessionState::Stopping(reason);
        self.last_stop = Some(reason);
        self.release_tracks();
        Effect::StopEncoder
    }

    fn finish(&mut self) {
        let blob = self.chunks.take_blob();
        self.release_tracks();
        self.composite = None;

        tracing::info!(
            session = %self.id,
            bytes = blob.len(),
            chunks = blob.chunk_count(),
            elapsed = self.elapsed_secs,
            "Recording ready"
        );
        self.state = SessionState::Ready(blob);
    }

    fn holds_track(&self, id: Uuid) -> bool {
        self.tracks.iter().any(|t| t.id() == id)
    }

    fn release_tracks(&mut self) {
        for track in self.tracks.drain(..) {
            track.stop();
        }
    }

    fn invalid(&self, action: &'static str) -> CaptureError {
        CaptureError::InvalidTransition {
            state: self.phase().name(),
            action,
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_tracks();
    }
}
