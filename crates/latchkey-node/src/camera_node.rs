//! AMB82 camera node board loop.
//!
//! Owns the network-side stack: the video recorder, the event logger and
//! policy, the MQTT client and the upload client, plus the serial link to
//! the sensor node. [`tick`](CameraNode::tick) drains the link, services
//! the recorder and the upload-edge handling, then drives the MQTT
//! connection and forwards remote unlock commands to the sensor board.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use latchkey_core::constants::RECORDING_DURATION_LONG_MS;
use latchkey_core::{Clock, EnrollError, Error, EventType, Result, UserPrompt};
use latchkey_events::{EventHandler, EventLogger};
use latchkey_network::{MqttClient, MqttTransport, UploadClient};
use latchkey_protocol::{Message, Opcode, Port};
use latchkey_storage::WifiCredentials;
use latchkey_video::{StreamPipeline, VideoRecorder};

use crate::shell::Shell;

const PORT_POLL: Duration = Duration::from_millis(1);

/// Debug shell actions for the camera board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraShellAction {
    Unlock,
    Enroll,
    Record,
    Stop,
    Status,
}

/// Command table for the camera board's debug shell.
pub fn camera_shell() -> Shell<CameraShellAction> {
    Shell::new()
        .command("unlock", "ask the sensor board to open the door", CameraShellAction::Unlock)
        .command(
            "enroll",
            "start fingerprint enrollment: enroll <slot>",
            CameraShellAction::Enroll,
        )
        .command("record", "start a recording: record [seconds]", CameraShellAction::Record)
        .command("stop", "stop the active recording", CameraShellAction::Stop)
        .command("status", "report recorder and broker state", CameraShellAction::Status)
}

/// The camera-side board.
pub struct CameraNode<IO, PL, T, C> {
    port: Port<IO>,
    recorder: VideoRecorder<PL, C>,
    logger: EventLogger<C>,
    handler: EventHandler,
    mqtt: MqttClient<T, C>,
    uploader: UploadClient,
}

impl<IO, PL, T, C> CameraNode<IO, PL, T, C>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    PL: StreamPipeline,
    T: MqttTransport,
    C: Clock,
{
    pub fn new(
        port: Port<IO>,
        recorder: VideoRecorder<PL, C>,
        logger: EventLogger<C>,
        mqtt: MqttClient<T, C>,
        uploader: UploadClient,
    ) -> Self {
        Self {
            port,
            recorder,
            logger,
            handler: EventHandler::new(),
            mqtt,
            uploader,
        }
    }

    /// Bring up the board: pipeline, event log, broker identity.
    pub async fn begin(&mut self, client_id: impl Into<String>) -> Result<()> {
        self.recorder.begin().await?;
        self.logger.begin();
        self.mqtt.begin(client_id);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Run one board loop iteration.
    pub async fn tick(&mut self) -> Result<()> {
        self.drain_port().await?;
        self.recorder.update().await?;

        if let Err(err) = self
            .handler
            .update(
                &mut self.recorder,
                &mut self.logger,
                &mut self.uploader,
                &mut self.mqtt,
            )
            .await
        {
            warn!(error = %err, "upload-edge handling failed");
        }

        for command in self.mqtt.update().await? {
            if command.payload.trim().eq_ignore_ascii_case("unlock") {
                info!(topic = %command.topic, "remote unlock command");
                self.port.send(&Message::unlock()).await?;
            } else {
                debug!(topic = %command.topic, payload = %command.payload, "unrecognized command");
            }
        }
        Ok(())
    }

    async fn drain_port(&mut self) -> Result<()> {
        loop {
            match self.port.recv_timeout(PORT_POLL).await {
                Ok(Some(msg)) => self.handle_message(msg).await?,
                Ok(None) => return Ok(()),
                Err(Error::ReceiveTimeout { .. }) => {
                    warn!("partial frame abandoned");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn handle_message(&mut self, msg: Message) -> Result<()> {
        match msg.opcode() {
            Opcode::SensorEvent => {
                let Some(event) = msg.first_byte().and_then(EventType::from_code) else {
                    warn!(payload = ?msg.payload(), "sensor event with unknown code");
                    return Ok(());
                };
                if let Err(err) = self
                    .handler
                    .handle_event(event, &mut self.recorder, &mut self.logger, &mut self.mqtt)
                    .await
                {
                    warn!(%event, error = %err, "event handling failed");
                }
            }
            Opcode::StartVideo => {
                match self
                    .recorder
                    .start_recording(Duration::from_millis(RECORDING_DURATION_LONG_MS), true)
                    .await
                {
                    Ok(()) => {}
                    Err(Error::Busy(_)) => debug!("video request folded into active recording"),
                    Err(err) => warn!(error = %err, "video start failed"),
                }
            }
            Opcode::StopVideo => self.recorder.stop_recording().await?,
            Opcode::EnrollSuccess => {
                let slot = msg.first_byte().unwrap_or(0);
                let line = format!("fingerprint enrolled in slot {slot}");
                info!(slot, "enrollment succeeded");
                self.logger.log_serial_message(&line);
                self.notify_best_effort("enrollment_success", &line).await;
            }
            Opcode::EnrollFailure => {
                let reason = msg
                    .first_byte()
                    .and_then(EnrollError::from_code)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown reason".into());
                let line = format!("enrollment failed: {reason}");
                warn!(%reason, "enrollment failed");
                self.logger.log_serial_message(&line);
                self.notify_best_effort("enrollment_failure", &line).await;
            }
            Opcode::UnlockFingerprint => {
                let slot = msg.first_byte().unwrap_or(0);
                let line = format!("door unlocked by fingerprint slot {slot}");
                info!(slot, "fingerprint unlock");
                self.logger.log_serial_message(&line);
                self.notify_best_effort("fingerprint_unlock", &line).await;
            }
            Opcode::PromptUser => {
                if let Some(prompt) = msg.first_byte().and_then(UserPrompt::from_code) {
                    info!(%prompt, "enrollment prompt");
                    self.logger.log_serial_message(&prompt.to_string());
                }
            }
            Opcode::MqttMessage => self.logger.log_serial_message(&msg.text()),
            other => debug!(opcode = %other, "ignoring message not addressed to this board"),
        }
        Ok(())
    }

    /// Publish a status notification; the board keeps running if the broker
    /// is unreachable.
    async fn notify_best_effort(&mut self, event_type: &str, description: &str) {
        if let Err(err) = self
            .mqtt
            .publish_notification(event_type, description, "")
            .await
        {
            warn!(event_type, error = %err, "notification failed");
        }
    }

    /// Run one debug shell action and return its output line.
    pub async fn run_shell_action(
        &mut self,
        action: CameraShellAction,
        args: &[String],
    ) -> Result<String> {
        match action {
            CameraShellAction::Unlock => {
                self.port.send(&Message::unlock()).await?;
                Ok("unlock request sent".into())
            }
            CameraShellAction::Enroll => {
                let slot = args
                    .first()
                    .ok_or_else(|| Error::InvalidValue("usage: enroll <slot>".into()))?
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidValue("slot must be a number".into()))?;
                let slot = latchkey_core::FingerprintId::new(slot)?;
                self.port.send(&Message::enroll_start(slot)).await?;
                Ok(format!("enrollment requested for {slot}"))
            }
            CameraShellAction::Record => {
                let seconds: u64 = match args.first() {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| Error::InvalidValue("seconds must be a number".into()))?,
                    None => RECORDING_DURATION_LONG_MS / 1_000,
                };
                self.recorder
                    .start_recording(Duration::from_secs(seconds), false)
                    .await?;
                Ok(format!("recording for {seconds}s"))
            }
            CameraShellAction::Stop => {
                self.recorder.stop_recording().await?;
                Ok("recording stopped".into())
            }
            CameraShellAction::Status => Ok(format!(
                "recorder: {}, broker: {}",
                if self.recorder.is_recording() { "recording" } else { "idle" },
                if self.mqtt.is_connected() { "connected" } else { "disconnected" },
            )),
        }
    }
}

/// Read the WiFi credentials persisted on the camera board's flash.
///
/// First boot has no file yet; `defaults` are written out so later boots
/// keep the same network. A malformed file is an error, not silently
/// replaced, since an operator may have edited it by hand.
pub async fn load_or_seed_credentials(
    path: impl AsRef<Path>,
    defaults: &WifiCredentials,
) -> Result<WifiCredentials> {
    let path = path.as_ref();
    match WifiCredentials::load(path).await {
        Ok(creds) => Ok(creds),
        Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no stored credentials, writing defaults");
            defaults.save(path).await?;
            Ok(defaults.clone())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::{HardwareId, ManualClock};
    use latchkey_network::{MockTransport, MockTransportHandle, MqttConfig, UploadConfig};
    use latchkey_video::{MockPipeline, MockPipelineHandle};
    use tokio::io::DuplexStream;

    struct Rig {
        node: CameraNode<DuplexStream, MockPipeline, MockTransport, ManualClock>,
        peer: Port<DuplexStream>,
        pipeline: MockPipelineHandle,
        transport: MockTransportHandle,
        clock: ManualClock,
    }

    async fn rig() -> Rig {
        let clock = ManualClock::new();
        let (a, b) = tokio::io::duplex(1024);

        let (pipeline, pipeline_handle) = MockPipeline::new();
        let recorder = VideoRecorder::new(pipeline, clock.clone(), "/storage");
        let logger = EventLogger::new(clock.clone());

        let (transport, transport_handle) = MockTransport::new();
        let mqtt = MqttClient::new(
            transport,
            clock.clone(),
            MqttConfig {
                hardware_id: HardwareId::new("amb82-test").unwrap(),
                notify_topic: "doorlock/events".into(),
                command_topic: "doorlock/commands".into(),
            },
        );

        let uploader = UploadClient::new(UploadConfig {
            host: "127.0.0.1".into(),
            port: 1,
            bucket: "/recordings/".into(),
        });

        let mut node = CameraNode::new(Port::new(a), recorder, logger, mqtt, uploader);
        node.begin("amb82-test").await.unwrap();

        Rig {
            node,
            peer: Port::new(b),
            pipeline: pipeline_handle,
            transport: transport_handle,
            clock,
        }
    }

    #[tokio::test]
    async fn sensor_event_starts_recording() {
        let mut rig = rig().await;
        rig.peer
            .send(&Message::sensor_event(EventType::MotionDetected.code()))
            .await
            .unwrap();
        rig.peer
            .send(&Message::empty(Opcode::StartVideo))
            .await
            .unwrap();

        rig.node.tick().await.unwrap();
        assert!(rig.node.is_recording());
        let _ = (&rig.pipeline, &rig.clock);
    }

    #[tokio::test]
    async fn stop_video_ends_recording() {
        let mut rig = rig().await;
        rig.peer
            .send(&Message::sensor_event(EventType::MotionDetected.code()))
            .await
            .unwrap();
        rig.node.tick().await.unwrap();
        assert!(rig.node.is_recording());

        rig.peer
            .send(&Message::empty(Opcode::StopVideo))
            .await
            .unwrap();
        rig.node.tick().await.unwrap();
        assert!(!rig.node.is_recording());
    }

    #[tokio::test]
    async fn remote_unlock_command_reaches_sensor_board() {
        let mut rig = rig().await;

        // First tick connects the broker
        rig.node.tick().await.unwrap();
        rig.transport.deliver("doorlock/commands", "unlock");
        rig.node.tick().await.unwrap();

        let msg = rig.peer.recv().await.unwrap();
        assert_eq!(msg.opcode(), Opcode::Unlock);
    }

    #[tokio::test]
    async fn enrollment_result_is_logged_and_published() {
        let mut rig = rig().await;
        rig.node.tick().await.unwrap(); // connect broker

        rig.peer
            .send(&Message::enroll_failure(EnrollError::Timeout))
            .await
            .unwrap();
        rig.node.tick().await.unwrap();

        let publishes = rig.transport.publishes();
        let failure = publishes
            .iter()
            .find(|(_, payload)| payload.contains("enrollment_failure"))
            .expect("failure notification published");
        assert!(failure.1.contains("timed out waiting for finger"));
    }

    #[tokio::test]
    async fn first_boot_seeds_default_wifi_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.conf");
        let defaults = WifiCredentials::new("front-door-net", "changeme");

        let loaded = load_or_seed_credentials(&path, &defaults).await.unwrap();
        assert_eq!(loaded, defaults);

        // Operator edits survive the next boot
        WifiCredentials::new("lobby-net", "hunter2")
            .save(&path)
            .await
            .unwrap();
        let loaded = load_or_seed_credentials(&path, &defaults).await.unwrap();
        assert_eq!(loaded.ssid, "lobby-net");
    }

    #[tokio::test]
    async fn malformed_credential_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.conf");
        tokio::fs::write(&path, "garbage\n").await.unwrap();

        let err = load_or_seed_credentials(&path, &WifiCredentials::new("net", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "garbage\n"
        );
    }

    #[tokio::test]
    async fn disconnected_broker_does_not_stall_the_loop() {
        let mut rig = rig().await;
        rig.transport.fail_next_connect("broker down");

        rig.peer
            .send(&Message::unlock_fingerprint(
                latchkey_core::FingerprintId::new(3).unwrap(),
            ))
            .await
            .unwrap();
        // Notification fails, tick still succeeds
        rig.node.tick().await.unwrap();
    }
}
