//! Capture session: state machine, chunk buffer, encoder seam and driver

pub mod blob;
pub mod driver;
pub mod encoder;
pub mod machine;

pub use blob::{ChunkSequence, RecordingBlob};
pub use driver::{CaptureController, Recorder};
pub use encoder::{ChunkEncoder, EncoderSettings, EncoderSink};
pub use machine::{
    format_elapsed, CaptureSession, Effect, SessionEvent, SessionPhase, SessionState,
    SessionStatus, StopReason,
};
