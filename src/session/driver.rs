//! Async driver for a capture session
//!
//! Runs one recording episode: acquires both sources, starts the encoder,
//! then feeds encoder output, the one-second ticker, user stop requests and
//! external track terminations into the [`CaptureSession`] in arrival order.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::media::{DisplayCapture, MediaSourceAcquirer, MediaTrack, MicrophoneCapture, TrackState};
use crate::session::blob::RecordingBlob;
use crate::session::encoder::{ChunkEncoder, EncoderSettings, EncoderSink};
use crate::session::machine::{CaptureSession, Effect, SessionEvent, SessionPhase, SessionState, SessionStatus};

/// Cloneable handle for stopping and observing a running session
#[derive(Clone)]
pub struct CaptureController {
    events: mpsc::UnboundedSender<SessionEvent>,
    session: Arc<Mutex<CaptureSession>>,
}

impl CaptureController {
    /// Request a stop. Safe to call at any time and any number of times.
    pub fn stop(&self) {
        let _ = self.events.send(SessionEvent::UserStop);
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().status()
    }
}

/// Records composite screen + microphone sessions
pub struct Recorder<D, M, E> {
    acquirer: MediaSourceAcquirer<D, M>,
    encoder: E,
    settings: EncoderSettings,
    session: Arc<Mutex<CaptureSession>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<D, M, E> Recorder<D, M, E>
where
    D: DisplayCapture,
    M: MicrophoneCapture,
    E: ChunkEncoder,
{
    pub fn new(acquirer: MediaSourceAcquirer<D, M>, encoder: E, config: &CaptureConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            acquirer,
            encoder,
            settings: EncoderSettings::from_config(config),
            session: Arc::new(Mutex::new(CaptureSession::new(config))),
            events_tx,
            events_rx,
        }
    }

    pub fn controller(&self) -> CaptureController {
        CaptureController {
            events: self.events_tx.clone(),
            session: self.session.clone(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().status()
    }

    /// Return a finished or failed session to idle
    pub fn discard(&self) -> Result<Option<RecordingBlob>, CaptureError> {
        self.session.lock().discard()
    }

    /// Run one episode to completion.
    ///
    /// Resolves with the recording once the encoder has flushed, or with the
    /// error that ended the session. Either way no track stays live. The
    /// session is then `Ready`/`Failed` until [`Recorder::discard`].
    pub async fn record(&mut self) -> Result<RecordingBlob, CaptureError> {
        self.session.lock().start()?;

        // Stop requests from an earlier episode must not end this one
        while self.events_rx.try_recv().is_ok() {}

        let mut episode = Episode::new(self.session.clone());

        let sources = match self.acquirer.acquire().await {
            Ok(sources) => sources,
            Err(e) => {
                self.session.lock().acquisition_failed(e.clone());
                return Err(e);
            }
        };

        let composite = self.session.lock().sources_ready(sources)?;
        let tracks = self.session.lock().tracks().to_vec();
        episode.watch_tracks(&tracks, &self.events_tx);

        let sink = EncoderSink::new(self.events_tx.clone());
        if let Err(e) = self.encoder.start(&composite, &self.settings, sink) {
            self.session.lock().fail(e.clone());
            return Err(e);
        }
        tracing::debug!(timeslice = ?self.settings.timeslice, mime = %self.settings.mime_type, "Encoder started");

        let second = Duration::from_secs(1);
        let mut ticker = interval_at(Instant::now() + second, second);

        loop {
            let recording = self.session.lock().phase() == SessionPhase::Recording;

            let event = tokio::select! {
                Some(event) = self.events_rx.recv() => event,
                _ = ticker.tick(), if recording => SessionEvent::Tick,
                else => {
                    self.session.lock().abandon();
                    return Err(CaptureError::Abandoned);
                }
            };

            if self.session.lock().handle(event) == Effect::StopEncoder {
                self.encoder.stop();
            }

            let outcome = match self.session.lock().state() {
                SessionState::Ready(blob) => Some(Ok(blob.clone())),
                SessionState::Failed(error) => Some(Err(error.clone())),
                _ => None,
            };

            match outcome {
                Some(Ok(blob)) => return Ok(blob),
                Some(Err(error)) => {
                    self.encoder.stop();
                    return Err(error);
                }
                None => {}
            }
        }
    }
}

/// Per-episode resources: track watchers, and the session to fail if the
/// episode is dropped before it finishes.
struct Episode {
    session: Arc<Mutex<CaptureSession>>,
    watchers: Vec<JoinHandle<()>>,
}

impl Episode {
    fn new(session: Arc<Mutex<CaptureSession>>) -> Self {
        Self {
            session,
            watchers: Vec::new(),
        }
    }

    /// Forward external termination of any track into the session
    fn watch_tracks(&mut self, tracks: &[Arc<MediaTrack>], events: &mpsc::UnboundedSender<SessionEvent>) {
        for track in tracks {
            let mut state = track.subscribe();
            let id = track.id();
            let events = events.clone();

            self.watchers.push(tokio::spawn(async move {
                if state.wait_for(|s| *s == TrackState::Ended).await.is_ok() {
                    tracing::info!(track = %id, "Track ended outside the session");
                    let _ = events.send(SessionEvent::TrackEnded(id));
                }
            }));
        }
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        self.session.lock().abandon();
    }
}
