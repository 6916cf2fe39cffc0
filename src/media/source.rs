//! Media sources and their independently stoppable tracks
//!
//! A [`MediaSource`] is what a capture capability hands back: a set of
//! tracks, each of which owns some piece of hardware (a display grabber,
//! a microphone stream). Tracks are shared as `Arc<MediaTrack>` between
//! the source, the composite stream and the capture session.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Which capture capability produced a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Screen/tab/window capture
    Display,
    /// Microphone capture
    Microphone,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Display => f.write_str("display"),
            SourceKind::Microphone => f.write_str("microphone"),
        }
    }
}

/// Media channel carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Lifecycle of a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Producing media
    Live,
    /// Released by its owner
    Stopped,
    /// Terminated from outside (permission revoked, device unplugged)
    Ended,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// One media channel from a capture source
pub struct MediaTrack {
    id: Uuid,
    kind: TrackKind,
    origin: SourceKind,
    label: String,
    state: watch::Sender<TrackState>,
    release: Mutex<Option<ReleaseHook>>,
}

impl MediaTrack {
    /// Create a live track with no underlying resource to release
    pub fn new(kind: TrackKind, origin: SourceKind, label: impl Into<String>) -> Arc<Self> {
        Self::build(kind, origin, label.into(), None)
    }

    /// Create a live track whose hardware is released by `release`.
    ///
    /// The hook runs exactly once, on whichever of stop/end/drop happens first.
    pub fn with_release<F>(
        kind: TrackKind,
        origin: SourceKind,
        label: impl Into<String>,
        release: F,
    ) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::build(kind, origin, label.into(), Some(Box::new(release)))
    }

    fn build(
        kind: TrackKind,
        origin: SourceKind,
        label: String,
        release: Option<ReleaseHook>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(TrackState::Live);
        Arc::new(Self {
            id: Uuid::new_v4(),
            kind,
            origin,
            label,
            state,
            release: Mutex::new(release),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Capability that produced this track
    pub fn origin(&self) -> SourceKind {
        self.origin
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TrackState {
        *self.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Release the track. Returns false if it was already stopped or ended.
    pub fn stop(&self) -> bool {
        self.transition(TrackState::Stopped)
    }

    /// Mark the track as terminated outside the owner's control.
    ///
    /// Capture backends call this when the OS or the user revokes the
    /// capture. Subscribers observe [`TrackState::Ended`].
    pub fn end(&self) -> bool {
        self.transition(TrackState::Ended)
    }

    /// Watch this track's state
    pub fn subscribe(&self) -> watch::Receiver<TrackState> {
        self.state.subscribe()
    }

    fn transition(&self, to: TrackState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == TrackState::Live {
                *state = to;
                true
            } else {
                false
            }
        });

        if changed {
            if let Some(release) = self.release.lock().take() {
                release();
            }
            tracing::debug!(track = %self.id, kind = ?self.kind, origin = %self.origin, state = ?to, "Track released");
        }
        changed
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capability handle returned by a capture backend
#[derive(Debug, Clone)]
pub struct MediaSource {
    kind: SourceKind,
    tracks: Vec<Arc<MediaTrack>>,
}

impl MediaSource {
    pub fn new(kind: SourceKind, tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self { kind, tracks }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// Stop every track of this source
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
