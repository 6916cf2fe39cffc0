//! Capture sources: tracks, acquisition and composite assembly

pub mod acquirer;
pub mod composite;
pub mod device;
pub mod microphone;
pub mod source;

pub use acquirer::{
    AcquiredSources, DisplayCapture, DisplayOptions, MediaSourceAcquirer, MicrophoneCapture,
    MicrophoneOptions,
};
pub use composite::{CompositeStream, CompositeStreamBuilder};
pub use device::{list_input_devices, InputDeviceInfo};
pub use microphone::{CpalMicrophone, PcmBlock};
pub use source::{MediaSource, MediaTrack, SourceKind, TrackKind, TrackState};
