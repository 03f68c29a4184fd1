//! Recording pipeline abstraction.
//!
//! The real camera node drives a vendor video stack (camera sensor, H.264
//! encoder, MP4 muxer linked into a pipeline). Those primitives stay behind
//! the [`StreamPipeline`] trait; the recorder only depends on the small
//! surface it actually needs.

#![allow(async_fn_in_trait)]

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use latchkey_hardware::Result;

/// State reported by the pipeline's encoder stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// No encode in progress.
    Idle,
    /// Frames are being encoded to the output file.
    Recording,
    /// The encoder finished the configured clip on its own.
    Completed,
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncoderState::Idle => "Idle",
            EncoderState::Recording => "Recording",
            EncoderState::Completed => "Completed",
        };
        write!(f, "{s}")
    }
}

/// Parameters for one recording session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Output file path on the storage medium.
    pub file_path: PathBuf,
    /// Requested clip length.
    pub duration: Duration,
}

/// Camera/encoder pipeline the recorder drives.
pub trait StreamPipeline {
    /// Tear down all inter-stage links, returning the pipeline to a known
    /// idle configuration. Safe to call at any time.
    async fn reset_links(&mut self) -> Result<()>;

    /// Apply session parameters to the muxer stage.
    async fn configure(&mut self, config: &RecordingConfig) -> Result<()>;

    /// Link the stages and start encoding.
    async fn start(&mut self) -> Result<()>;

    /// Stop encoding and flush the output file.
    async fn stop(&mut self) -> Result<()>;

    /// Current encoder stage state.
    fn encoder_state(&self) -> EncoderState;
}

#[derive(Debug, Default)]
struct PipelineScript {
    /// States replayed by `encoder_state`; the last one holds.
    states: VecDeque<EncoderState>,
    current: Option<EncoderState>,
    /// Operations to fail, by name.
    failures: VecDeque<String>,
    journal: Vec<String>,
    last_config: Option<RecordingConfig>,
}

/// Scriptable pipeline for tests and the emulated board.
///
/// `start` moves the encoder to `Recording` and `stop`/`reset_links` move it
/// to `Idle` unless a scripted state sequence overrides the reported value.
#[derive(Debug)]
pub struct MockPipeline {
    script: Arc<Mutex<PipelineScript>>,
}

impl MockPipeline {
    pub fn new() -> (Self, MockPipelineHandle) {
        let script = Arc::new(Mutex::new(PipelineScript::default()));
        (
            Self {
                script: Arc::clone(&script),
            },
            MockPipelineHandle { script },
        )
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut PipelineScript) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }

    fn run_op(&mut self, op: &str, on_ok: Option<EncoderState>) -> Result<()> {
        self.with_script(|s| {
            s.journal.push(op.to_string());
            if s.failures.front().is_some_and(|f| f == op) {
                s.failures.pop_front();
                return Err(latchkey_hardware::HardwareError::pipeline(format!(
                    "{op} failed"
                )));
            }
            if let Some(state) = on_ok {
                if s.states.is_empty() {
                    s.current = Some(state);
                }
            }
            Ok(())
        })
    }
}

impl StreamPipeline for MockPipeline {
    async fn reset_links(&mut self) -> Result<()> {
        self.run_op("reset_links", Some(EncoderState::Idle))
    }

    async fn configure(&mut self, config: &RecordingConfig) -> Result<()> {
        let result = self.run_op("configure", None);
        if result.is_ok() {
            self.with_script(|s| s.last_config = Some(config.clone()));
        }
        result
    }

    async fn start(&mut self) -> Result<()> {
        self.run_op("start", Some(EncoderState::Recording))
    }

    async fn stop(&mut self) -> Result<()> {
        self.run_op("stop", Some(EncoderState::Idle))
    }

    fn encoder_state(&self) -> EncoderState {
        self.with_script(|s| {
            if let Some(next) = s.states.pop_front() {
                s.current = Some(next);
            }
            s.current.unwrap_or(EncoderState::Idle)
        })
    }
}

/// Handle for scripting a [`MockPipeline`].
#[derive(Debug, Clone)]
pub struct MockPipelineHandle {
    script: Arc<Mutex<PipelineScript>>,
}

impl MockPipelineHandle {
    fn with_script<T>(&self, f: impl FnOnce(&mut PipelineScript) -> T) -> T {
        let mut script = self.script.lock().expect("script lock poisoned");
        f(&mut script)
    }

    /// Queue encoder states returned by successive `encoder_state` calls;
    /// the last queued state holds once the queue drains.
    pub fn queue_encoder_states(&self, states: impl IntoIterator<Item = EncoderState>) {
        self.with_script(|s| s.states.extend(states));
    }

    /// Fail the next occurrence of the named operation.
    pub fn fail_next(&self, op: &str) {
        self.with_script(|s| s.failures.push_back(op.to_string()));
    }

    /// Operations performed so far, in call order.
    pub fn journal(&self) -> Vec<String> {
        self.with_script(|s| s.journal.clone())
    }

    /// Config passed to the most recent `configure` call.
    pub fn last_config(&self) -> Option<RecordingConfig> {
        self.with_script(|s| s.last_config.clone())
    }
}
