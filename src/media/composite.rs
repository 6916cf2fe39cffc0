//! Composite stream assembly
//!
//! Picks the video track from the display source and the audio track from
//! the microphone source. No samples pass through here; the composite is
//! only the track set handed to the encoder.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::CaptureError;
use crate::media::source::{MediaSource, MediaTrack, SourceKind};

/// One video track (display) plus one audio track (microphone)
#[derive(Debug, Clone)]
pub struct CompositeStream {
    id: Uuid,
    video: Arc<MediaTrack>,
    audio: Arc<MediaTrack>,
    /// Tab/system audio carried along when the caller opts in
    passthrough_audio: Option<Arc<MediaTrack>>,
}

impl CompositeStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn video(&self) -> &Arc<MediaTrack> {
        &self.video
    }

    pub fn audio(&self) -> &Arc<MediaTrack> {
        &self.audio
    }

    pub fn passthrough_audio(&self) -> Option<&Arc<MediaTrack>> {
        self.passthrough_audio.as_ref()
    }

    /// All tracks the encoder should consume
    pub fn tracks(&self) -> impl Iterator<Item = &Arc<MediaTrack>> {
        [&self.video, &self.audio]
            .into_iter()
            .chain(self.passthrough_audio.as_ref())
    }
}

/// Builds a [`CompositeStream`] from a display and a microphone source
#[derive(Debug, Clone, Default)]
pub struct CompositeStreamBuilder {
    keep_display_audio: bool,
}

impl CompositeStreamBuilder {
    pub fn new(keep_display_audio: bool) -> Self {
        Self { keep_display_audio }
    }

    pub fn build(
        &self,
        display: &MediaSource,
        microphone: &MediaSource,
    ) -> Result<CompositeStream, CaptureError> {
        let video = display
            .video_tracks()
            .find(|t| t.origin() == SourceKind::Display && t.is_live())
            .cloned()
            .ok_or(CaptureError::NoTracks { kind: SourceKind::Display })?;

        let audio = microphone
            .audio_tracks()
            .find(|t| t.origin() == SourceKind::Microphone && t.is_live())
            .cloned()
            .ok_or(CaptureError::NoTracks { kind: SourceKind::Microphone })?;

        let passthrough_audio = if self.keep_display_audio {
            display.audio_tracks().find(|t| t.is_live()).cloned()
        } else {
            None
        };

        let composite = CompositeStream {
            id: Uuid::new_v4(),
            video,
            audio,
            passthrough_audio,
        };

        tracing::debug!(
            composite = %composite.id,
            video = composite.video.label(),
            audio = composite.audio.label(),
            passthrough = composite.passthrough_audio.is_some(),
            "Composite stream assembled"
        );

        Ok(composite)
    }
}
