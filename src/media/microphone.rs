//! Microphone capture backed by cpal
//!
//! Each acquisition opens the input stream on a dedicated thread (cpal
//! streams are not `Send` on every host) and returns a single audio track.
//! Stopping the track ends the thread, which drops the stream and releases
//! the device. A stream error ends the track externally.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CaptureError;
use crate::media::acquirer::{MicrophoneCapture, MicrophoneOptions};
use crate::media::device::input_device;
use crate::media::source::{MediaSource, MediaTrack, SourceKind, TrackKind};

/// Interleaved PCM block delivered to whoever encodes the microphone
#[derive(Debug, Clone)]
pub struct PcmBlock {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    /// Microseconds since the capture opened
    pub timestamp_us: u64,
}

/// Microphone capability using the host audio API
#[derive(Clone, Default)]
pub struct CpalMicrophone {
    feed: Option<Sender<PcmBlock>>,
    samples_captured: Arc<AtomicU64>,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward captured PCM to `feed`. Blocks are dropped when it is full.
    pub fn with_feed(feed: Sender<PcmBlock>) -> Self {
        Self {
            feed: Some(feed),
            samples_captured: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total samples captured across all acquisitions
    pub fn samples_captured(&self) -> u64 {
        self.samples_captured.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MicrophoneCapture for CpalMicrophone {
    async fn acquire(&self, options: &MicrophoneOptions) -> Result<MediaSource, CaptureError> {
        let device_id = options.device_id.clone();
        let feed = self.feed.clone();
        let samples_captured = self.samples_captured.clone();

        tokio::task::spawn_blocking(move || open_input(device_id, feed, samples_captured))
            .await
            .map_err(|e| CaptureError::Device(e.to_string()))?
    }
}

fn open_input(
    device_id: Option<String>,
    feed: Option<Sender<PcmBlock>>,
    samples_captured: Arc<AtomicU64>,
) -> Result<MediaSource, CaptureError> {
    let device = input_device(device_id.as_deref())?;
    let label = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let config: cpal::StreamConfig = device.default_input_config()?.into();

    let running = Arc::new(AtomicBool::new(true));
    let release_flag = running.clone();
    let track = MediaTrack::with_release(TrackKind::Audio, SourceKind::Microphone, label.clone(), move || {
        release_flag.store(false, Ordering::SeqCst);
    });

    let (ready_tx, ready_rx) = bounded::<Result<(), CaptureError>>(1);
    let weak_track: Weak<MediaTrack> = Arc::downgrade(&track);

    thread::Builder::new()
        .name("mic-capture".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let channels = config.channels;
            let sample_rate = config.sample_rate.0;
            let running_for_data = running.clone();

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !running_for_data.load(Ordering::Relaxed) {
                        return;
                    }
                    samples_captured.fetch_add(data.len() as u64, Ordering::Relaxed);

                    if let Some(feed) = &feed {
                        let _ = feed.try_send(PcmBlock {
                            samples: data.to_vec(),
                            channels,
                            sample_rate,
                            timestamp_us: start_time.elapsed().as_micros() as u64,
                        });
                    }
                },
                move |err| {
                    tracing::warn!("Microphone stream error: {}", err);
                    if let Some(track) = weak_track.upgrade() {
                        track.end();
                    }
                },
                None,
            );

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::AcquisitionDenied {
                    kind: SourceKind::Microphone,
                    reason: e.to_string(),
                }));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
            // Stream is dropped here, releasing the device
        })
        .map_err(|e| CaptureError::Device(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => {
            tracing::info!(device = %label, "Microphone capture opened");
            Ok(MediaSource::new(SourceKind::Microphone, vec![track]))
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(CaptureError::Device("capture thread exited".to_string())),
    }
}
