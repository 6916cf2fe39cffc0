//! Acquisition of the display and microphone sources

use async_trait::async_trait;

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::media::source::MediaSource;

/// Parameters for a display capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Requested frame rate
    pub frame_rate: u32,
    /// Ask for tab/system audio alongside the video
    pub audio: bool,
}

/// Parameters for a microphone capture request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrophoneOptions {
    /// Device identifier, or the default input device when `None`
    pub device_id: Option<String>,
}

/// Screen capture capability
#[async_trait]
pub trait DisplayCapture: Send + Sync {
    /// Prompt for and open a display capture. Resolves once, with no partial result.
    async fn acquire(&self, options: &DisplayOptions) -> Result<MediaSource, CaptureError>;
}

/// Microphone capture capability
#[async_trait]
pub trait MicrophoneCapture: Send + Sync {
    /// Open a microphone capture. Resolves once, with no partial result.
    async fn acquire(&self, options: &MicrophoneOptions) -> Result<MediaSource, CaptureError>;
}

/// Both sources of one capture episode
#[derive(Debug, Clone)]
pub struct AcquiredSources {
    pub display: MediaSource,
    pub microphone: MediaSource,
}

impl AcquiredSources {
    pub fn stop_all(&self) {
        self.display.stop_all();
        self.microphone.stop_all();
    }
}

/// Obtains the display and microphone sources for a session
pub struct MediaSourceAcquirer<D, M> {
    display: D,
    microphone: M,
    display_options: DisplayOptions,
    microphone_options: MicrophoneOptions,
}

impl<D: DisplayCapture, M: MicrophoneCapture> MediaSourceAcquirer<D, M> {
    pub fn new(display: D, microphone: M, config: &CaptureConfig) -> Self {
        Self {
            display,
            microphone,
            display_options: DisplayOptions {
                frame_rate: config.frame_rate,
                audio: true,
            },
            microphone_options: MicrophoneOptions {
                device_id: config.microphone_device.clone(),
            },
        }
    }

    pub fn display_options(&self) -> &DisplayOptions {
        &self.display_options
    }

    /// Acquire the display first, then the microphone.
    ///
    /// If the microphone is refused, the display source is released before
    /// the error is returned, so nothing stays open after a failed start.
    pub async fn acquire(&self) -> Result<AcquiredSources, CaptureError> {
        let display = self.display.acquire(&self.display_options).await?;
        let display_tracks = display.tracks().len();
        tracing::info!(tracks = display_tracks, "Display source acquired");

        match self.microphone.acquire(&self.microphone_options).await {
            Ok(microphone) => {
                tracing::info!(tracks = microphone.tracks().len(), "Microphone source acquired");
                Ok(AcquiredSources { display, microphone })
            }
            Err(e) => {
                tracing::warn!("Microphone acquisition failed, releasing display: {}", e);
                display.stop_all();
                Err(e)
            }
        }
    }
}
