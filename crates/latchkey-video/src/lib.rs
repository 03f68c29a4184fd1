//! Video recording pipeline for the camera node.

pub mod pipeline;
pub mod recorder;

pub use pipeline::{EncoderState, MockPipeline, MockPipelineHandle, RecordingConfig, StreamPipeline};
pub use recorder::{RecordingSession, VideoRecorder};
