//! Recording session management.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use latchkey_core::constants::ENCODER_ERROR_GRACE_MS;
use latchkey_core::{Clock, Error, Result};
use latchkey_hardware::HardwareError;

use crate::pipeline::{EncoderState, RecordingConfig, StreamPipeline};

/// One in-flight or finished recording.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub file_path: PathBuf,
    pub started_at: Instant,
    pub duration: Duration,
    /// Whether the clip should be uploaded once the session ends.
    pub upload: bool,
}

/// Drives one recording session at a time over a [`StreamPipeline`].
///
/// The pipeline's inter-stage links are reset before every start and after
/// every stop, so a session always begins from a known-idle configuration
/// even if a previous session ended abnormally.
#[derive(Debug)]
pub struct VideoRecorder<P, C> {
    pipeline: P,
    clock: C,
    storage_root: PathBuf,
    initialized: bool,
    session: Option<RecordingSession>,
    finished: Option<RecordingSession>,
}

impl<P: StreamPipeline, C: Clock> VideoRecorder<P, C> {
    pub fn new(pipeline: P, clock: C, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            clock,
            storage_root: storage_root.into(),
            initialized: false,
            session: None,
            finished: None,
        }
    }

    /// Prepare the pipeline. Must be called once before recording.
    pub async fn begin(&mut self) -> Result<()> {
        self.pipeline.reset_links().await.map_err(hw_err)?;
        self.initialized = true;
        Ok(())
    }

    /// Start a new recording of `duration`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before [`begin`](Self::begin),
    /// [`Error::Busy`] while a session is active, and [`Error::Hardware`]
    /// when the pipeline fails to reach the recording state. On failure any
    /// partially started stage is torn down.
    pub async fn start_recording(&mut self, duration: Duration, should_upload: bool) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized("video recorder".into()));
        }
        if self.session.is_some() {
            return Err(Error::Busy("recording in progress".into()));
        }

        self.pipeline.reset_links().await.map_err(hw_err)?;

        let file_path = self
            .storage_root
            .join(format!("VIDEO_{}.mp4", Uuid::new_v4()));
        let config = RecordingConfig {
            file_path: file_path.clone(),
            duration,
        };

        if let Err(err) = self.bring_up(&config).await {
            self.tear_down().await;
            return Err(hw_err(err));
        }

        info!(path = %file_path.display(), ?duration, upload = should_upload, "recording started");
        self.session = Some(RecordingSession {
            file_path,
            started_at: self.clock.now(),
            duration,
            upload: should_upload,
        });
        Ok(())
    }

    async fn bring_up(
        &mut self,
        config: &RecordingConfig,
    ) -> std::result::Result<(), HardwareError> {
        self.pipeline.configure(config).await?;
        self.pipeline.start().await?;
        if self.pipeline.encoder_state() != EncoderState::Recording {
            return Err(HardwareError::pipeline("encoder did not enter recording"));
        }
        Ok(())
    }

    async fn tear_down(&mut self) {
        if let Err(err) = self.pipeline.stop().await {
            debug!(error = %err, "pipeline stop during teardown failed");
        }
        if let Err(err) = self.pipeline.reset_links().await {
            debug!(error = %err, "pipeline reset during teardown failed");
        }
    }

    /// Stop the active recording, if any. Safe to call repeatedly.
    pub async fn stop_recording(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            self.pipeline.stop().await.map_err(hw_err)?;
            info!(path = %session.file_path.display(), "recording stopped");
            self.finished = Some(session);
        }
        self.pipeline.reset_links().await.map_err(hw_err)?;
        Ok(())
    }

    /// Service the active session.
    ///
    /// Stops when the encoder reports completion, when the encoder falls
    /// back to idle shortly after start (encoder fault), or when the
    /// requested duration elapses, whichever comes first.
    pub async fn update(&mut self) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let elapsed = self.clock.elapsed_ms(session.started_at);

        match self.pipeline.encoder_state() {
            EncoderState::Completed => {
                debug!("encoder completed early");
                self.stop_recording().await
            }
            EncoderState::Idle if elapsed > ENCODER_ERROR_GRACE_MS => {
                warn!(elapsed_ms = elapsed, "encoder dropped to idle, aborting session");
                self.stop_recording().await
            }
            _ if elapsed >= session.duration.as_millis() as u64 => self.stop_recording().await,
            _ => Ok(()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Upload flag of the active session (false when idle).
    pub fn should_upload(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.upload)
    }

    /// Output path of the active session.
    pub fn file_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.file_path.as_path())
    }

    /// Take the most recently finished session, if one is pending.
    pub fn take_finished(&mut self) -> Option<RecordingSession> {
        self.finished.take()
    }
}

fn hw_err(err: HardwareError) -> Error {
    Error::Hardware(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{MockPipeline, MockPipelineHandle};
    use latchkey_core::ManualClock;

    fn recorder() -> (
        VideoRecorder<MockPipeline, ManualClock>,
        MockPipelineHandle,
        ManualClock,
    ) {
        let clock = ManualClock::new();
        let (pipeline, handle) = MockPipeline::new();
        (
            VideoRecorder::new(pipeline, clock.clone(), "/storage"),
            handle,
            clock,
        )
    }

    #[tokio::test]
    async fn start_resets_links_first_and_names_unique_file() {
        let (mut rec, handle, _clock) = recorder();
        rec.begin().await.unwrap();
        rec.start_recording(Duration::from_secs(10), true).await.unwrap();

        assert_eq!(
            handle.journal(),
            vec!["reset_links", "reset_links", "configure", "start"]
        );
        let config = handle.last_config().unwrap();
        let name = config.file_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("VIDEO_") && name.ends_with(".mp4"));
        assert!(config.file_path.starts_with("/storage"));
        assert!(rec.is_recording());
        assert!(rec.should_upload());
    }

    #[tokio::test]
    async fn start_before_begin_rejected() {
        let (mut rec, _handle, _clock) = recorder();
        let err = rec
            .start_recording(Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[tokio::test]
    async fn second_start_rejected_while_recording() {
        let (mut rec, _handle, _clock) = recorder();
        rec.begin().await.unwrap();
        rec.start_recording(Duration::from_secs(5), false).await.unwrap();

        let err = rec
            .start_recording(Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
        assert!(rec.is_recording());
    }

    #[tokio::test]
    async fn failed_start_tears_down_stages() {
        let (mut rec, handle, _clock) = recorder();
        rec.begin().await.unwrap();
        handle.fail_next("start");

        let err = rec
            .start_recording(Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Hardware(_)));
        assert!(!rec.is_recording());
        // Teardown after the failed start: stop then reset
        let journal = handle.journal();
        assert_eq!(&journal[journal.len() - 2..], &["stop", "reset_links"]);
    }

    #[tokio::test]
    async fn stop_is_idempotent_with_defensive_reset() {
        let (mut rec, handle, _clock) = recorder();
        rec.begin().await.unwrap();
        rec.start_recording(Duration::from_secs(5), false).await.unwrap();

        rec.stop_recording().await.unwrap();
        assert!(!rec.is_recording());
        let len_after_first = handle.journal().len();

        // Second stop only resets links again
        rec.stop_recording().await.unwrap();
        let journal = handle.journal();
        assert_eq!(journal.len(), len_after_first + 1);
        assert_eq!(journal.last().unwrap(), "reset_links");
    }

    #[tokio::test]
    async fn update_stops_when_duration_elapses() {
        let (mut rec, _handle, clock) = recorder();
        rec.begin().await.unwrap();
        rec.start_recording(Duration::from_secs(10), true).await.unwrap();

        clock.advance(9_999);
        rec.update().await.unwrap();
        assert!(rec.is_recording());

        clock.advance(1);
        rec.update().await.unwrap();
        assert!(!rec.is_recording());
        let finished = rec.take_finished().unwrap();
        assert!(finished.upload);
        assert!(rec.take_finished().is_none());
    }

    #[tokio::test]
    async fn update_stops_on_early_encoder_completion() {
        let (mut rec, handle, _clock) = recorder();
        rec.begin().await.unwrap();
        handle.queue_encoder_states([EncoderState::Recording, EncoderState::Completed]);
        rec.start_recording(Duration::from_secs(10), true).await.unwrap();

        rec.update().await.unwrap();
        assert!(!rec.is_recording());
        assert!(rec.take_finished().is_some());
    }

    #[tokio::test]
    async fn encoder_idle_after_grace_aborts_session() {
        let (mut rec, handle, clock) = recorder();
        rec.begin().await.unwrap();
        handle.queue_encoder_states([EncoderState::Recording, EncoderState::Idle]);
        rec.start_recording(Duration::from_secs(10), false).await.unwrap();

        // Within the grace window an idle encoder is tolerated
        rec.update().await.unwrap();
        assert!(rec.is_recording());

        clock.advance(ENCODER_ERROR_GRACE_MS + 1);
        rec.update().await.unwrap();
        assert!(!rec.is_recording());
    }
}
