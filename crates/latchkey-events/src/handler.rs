//! Event-to-recording policy for the camera node.
//!
//! Maps incoming security events to recording sessions, then watches the
//! recorder for the end of each session and runs the upload-and-notify
//! sequence for upload-flagged clips. The recorder, logger, uploader and
//! sink are borrowed per call, so the handler itself is plain state.

use std::time::Duration;

use tracing::{debug, info, warn};

use latchkey_core::constants::{RECORDING_DURATION_LONG_MS, RECORDING_DURATION_SHORT_MS};
use latchkey_core::{Clock, Error, EventType, Result};
use latchkey_video::{StreamPipeline, VideoRecorder};

use crate::logger::EventLogger;
use crate::traits::{MediaUploader, NotificationSink};

const DEFAULT_DESCRIPTION: &str = "Security event recorded";

/// Reacts to security events and closes out finished recordings.
#[derive(Debug, Default)]
pub struct EventHandler {
    /// Event that started the current upload-flagged session.
    latched: Option<EventType>,
    was_recording: bool,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the policy for one incoming event.
    ///
    /// Motion and unauthorized door openings start a long upload-flagged
    /// recording; a failed fingerprint press starts a short one. A door
    /// opened normally is notified immediately without any recording. A
    /// recorder already busy with a session absorbs the event silently; the
    /// running clip covers it.
    pub async fn handle_event<P, C, LC, N>(
        &mut self,
        event: EventType,
        recorder: &mut VideoRecorder<P, C>,
        logger: &mut EventLogger<LC>,
        sink: &mut N,
    ) -> Result<()>
    where
        P: StreamPipeline,
        C: Clock,
        LC: Clock,
        N: NotificationSink,
    {
        info!(%event, "security event");
        logger.log_event(event.code(), event.label());

        let duration_ms = match event {
            EventType::MotionDetected | EventType::UnauthorizedDoorOpen => {
                RECORDING_DURATION_LONG_MS
            }
            EventType::FingerprintFailure => RECORDING_DURATION_SHORT_MS,
            EventType::DoorOpened => {
                return sink.notify(event, event.label(), "").await;
            }
        };

        match recorder
            .start_recording(Duration::from_millis(duration_ms), true)
            .await
        {
            Ok(()) => {
                self.latched = Some(event);
                Ok(())
            }
            Err(Error::Busy(_)) => {
                debug!(%event, "recording already active, event folded into current clip");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Watch for the end of a recording session and close it out.
    ///
    /// On the recording-active true-to-false edge of an upload-flagged
    /// session: upload the clip, publish a notification composed from the
    /// event summary (or a default line) and the media URL, and clear the
    /// logger. Upload failures are logged and never retried here.
    pub async fn update<P, C, LC, U, N>(
        &mut self,
        recorder: &mut VideoRecorder<P, C>,
        logger: &mut EventLogger<LC>,
        uploader: &mut U,
        sink: &mut N,
    ) -> Result<()>
    where
        P: StreamPipeline,
        C: Clock,
        LC: Clock,
        U: MediaUploader,
        N: NotificationSink,
    {
        let now_recording = recorder.is_recording();
        let edge = self.was_recording && !now_recording;
        self.was_recording = now_recording;
        if !edge {
            return Ok(());
        }

        let Some(session) = recorder.take_finished() else {
            return Ok(());
        };
        if !session.upload {
            self.latched = None;
            return Ok(());
        }

        let event = self.latched.take();
        match uploader.upload_file(&session.file_path).await {
            Ok(url) => {
                let description = if logger.has_events() {
                    logger.summary()
                } else {
                    DEFAULT_DESCRIPTION.to_string()
                };
                if let Some(event) = event {
                    sink.notify(event, &description, &url).await?;
                } else {
                    warn!("upload-flagged session finished without a triggering event");
                }
            }
            Err(err) => {
                warn!(path = %session.file_path.display(), error = %err, "clip upload failed");
            }
        }
        logger.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::ManualClock;
    use latchkey_video::{MockPipeline, MockPipelineHandle};
    use std::path::Path;

    #[derive(Default)]
    struct FakeUploader {
        uploads: Vec<String>,
        fail: bool,
    }

    impl MediaUploader for FakeUploader {
        async fn upload_file(&mut self, path: &Path) -> Result<String> {
            if self.fail {
                return Err(Error::UploadFailed("connection refused".into()));
            }
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.uploads.push(name.clone());
            Ok(format!("http://media.local/recordings/{name}"))
        }
    }

    #[derive(Default)]
    struct FakeSink {
        notifications: Vec<(EventType, String, String)>,
    }

    impl NotificationSink for FakeSink {
        async fn notify(
            &mut self,
            event: EventType,
            description: &str,
            media_url: &str,
        ) -> Result<()> {
            self.notifications
                .push((event, description.to_string(), media_url.to_string()));
            Ok(())
        }
    }

    struct Rig {
        handler: EventHandler,
        recorder: VideoRecorder<MockPipeline, ManualClock>,
        pipeline: MockPipelineHandle,
        logger: EventLogger<ManualClock>,
        uploader: FakeUploader,
        sink: FakeSink,
        clock: ManualClock,
    }

    async fn rig() -> Rig {
        let clock = ManualClock::new();
        let (pipeline, handle) = MockPipeline::new();
        let mut recorder = VideoRecorder::new(pipeline, clock.clone(), "/storage");
        recorder.begin().await.unwrap();
        let mut logger = EventLogger::new(clock.clone());
        logger.begin();
        Rig {
            handler: EventHandler::new(),
            recorder,
            pipeline: handle,
            logger,
            uploader: FakeUploader::default(),
            sink: FakeSink::default(),
            clock,
        }
    }

    impl Rig {
        async fn handle(&mut self, event: EventType) -> Result<()> {
            self.handler
                .handle_event(event, &mut self.recorder, &mut self.logger, &mut self.sink)
                .await
        }

        async fn update(&mut self) -> Result<()> {
            self.handler
                .update(
                    &mut self.recorder,
                    &mut self.logger,
                    &mut self.uploader,
                    &mut self.sink,
                )
                .await
        }

        /// Run the clock past the active session and service the recorder.
        async fn finish_recording(&mut self) {
            self.update().await.unwrap();
            self.clock.advance(RECORDING_DURATION_LONG_MS);
            self.recorder.update().await.unwrap();
        }
    }

    #[tokio::test]
    async fn motion_starts_long_upload_recording() {
        let mut rig = rig().await;
        rig.handle(EventType::MotionDetected).await.unwrap();

        assert!(rig.recorder.is_recording());
        assert!(rig.recorder.should_upload());
        let config = rig.pipeline.last_config().unwrap();
        assert_eq!(
            config.duration,
            Duration::from_millis(RECORDING_DURATION_LONG_MS)
        );
    }

    #[tokio::test]
    async fn fingerprint_failure_starts_short_recording() {
        let mut rig = rig().await;
        rig.handle(EventType::FingerprintFailure).await.unwrap();

        let config = rig.pipeline.last_config().unwrap();
        assert_eq!(
            config.duration,
            Duration::from_millis(RECORDING_DURATION_SHORT_MS)
        );
    }

    #[tokio::test]
    async fn door_opened_notifies_immediately_without_recording() {
        let mut rig = rig().await;
        rig.handle(EventType::DoorOpened).await.unwrap();

        assert!(!rig.recorder.is_recording());
        assert_eq!(rig.sink.notifications.len(), 1);
        let (event, _, url) = &rig.sink.notifications[0];
        assert_eq!(*event, EventType::DoorOpened);
        assert!(url.is_empty());
    }

    #[tokio::test]
    async fn event_during_recording_is_absorbed() {
        let mut rig = rig().await;
        rig.handle(EventType::MotionDetected).await.unwrap();
        rig.handle(EventType::UnauthorizedDoorOpen).await.unwrap();

        assert!(rig.recorder.is_recording());
        // Both events still land in the log
        assert_eq!(rig.logger.events().count(), 2);
    }

    #[tokio::test]
    async fn finished_session_uploads_and_notifies_with_summary() {
        let mut rig = rig().await;
        rig.handle(EventType::MotionDetected).await.unwrap();
        rig.finish_recording().await;
        rig.update().await.unwrap();

        assert_eq!(rig.uploader.uploads.len(), 1);
        assert!(rig.uploader.uploads[0].starts_with("VIDEO_"));

        assert_eq!(rig.sink.notifications.len(), 1);
        let (event, description, url) = &rig.sink.notifications[0];
        assert_eq!(*event, EventType::MotionDetected);
        assert!(description.contains("motion_detected"));
        assert!(url.starts_with("http://media.local/recordings/VIDEO_"));

        // Logger cleared for the next cycle
        assert!(!rig.logger.has_events());
    }

    #[tokio::test]
    async fn empty_log_falls_back_to_default_description() {
        let mut rig = rig().await;
        rig.handle(EventType::MotionDetected).await.unwrap();
        rig.logger.clear();
        rig.finish_recording().await;
        rig.update().await.unwrap();

        let (_, description, _) = &rig.sink.notifications[0];
        assert_eq!(description, DEFAULT_DESCRIPTION);
    }

    #[tokio::test]
    async fn upload_failure_skips_notification_and_clears_log() {
        let mut rig = rig().await;
        rig.uploader.fail = true;
        rig.handle(EventType::UnauthorizedDoorOpen).await.unwrap();
        rig.finish_recording().await;
        rig.update().await.unwrap();

        assert!(rig.sink.notifications.is_empty());
        assert!(!rig.logger.has_events());

        // A later cycle still works
        rig.uploader.fail = false;
        rig.handle(EventType::MotionDetected).await.unwrap();
        rig.finish_recording().await;
        rig.update().await.unwrap();
        assert_eq!(rig.sink.notifications.len(), 1);
    }
}
