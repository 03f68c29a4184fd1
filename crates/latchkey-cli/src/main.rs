//! Emulated door lock pair.
//!
//! Builds both boards with mock hardware, wires them over an in-process
//! serial link, and runs a scripted scenario: a finger press that unlocks
//! the door, a motion event that triggers a recording, and a remote unlock
//! command arriving over the broker transport. Time is driven by a manual
//! clock so the scenario plays out in milliseconds.
//!
//! Run with `RUST_LOG=debug` for the full board-level trace.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use latchkey_core::constants::{MATCH_SETTLE_MS, SENSOR_CHECK_INTERVAL_MS, UNLOCK_DURATION_MS};
use latchkey_core::{FingerprintId, HardwareId, ManualClock};
use latchkey_events::EventLogger;
use latchkey_hardware::mock::{MockBuzzer, MockFingerprint, MockPin, MockSensor};
use latchkey_hardware::SensorKind;
use latchkey_lock::{LockController, SensorManager};
use latchkey_network::{MockTransport, MqttClient, MqttConfig, UploadClient, UploadConfig};
use latchkey_node::{load_or_seed_credentials, CameraNode, SensorNode};
use latchkey_protocol::Port;
use latchkey_storage::WifiCredentials;
use latchkey_video::{MockPipeline, VideoRecorder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let clock = ManualClock::new();
    let (sensor_io, camera_io) = tokio::io::duplex(4096);

    // Sensor board with mock hardware
    let (fingerprint, fingerprint_handle) = MockFingerprint::new();
    let (pin, _pin) = MockPin::new();
    let (buzzer, buzzer_handle) = MockBuzzer::new();
    let mut sensors = SensorManager::new(clock.clone());
    let (motion, motion_handle) = MockSensor::new(SensorKind::Motion);
    let (door, _door_handle) = MockSensor::new(SensorKind::DoorContact);
    sensors.register(motion)?;
    sensors.register(door)?;

    let mut sensor_node = SensorNode::new(
        Port::new(sensor_io),
        fingerprint,
        LockController::new(pin, clock.clone()),
        sensors,
        buzzer,
        clock.clone(),
    );

    // Camera board bring-up: persisted credentials, then the mock pipeline
    // and broker transport
    let storage_root = std::path::Path::new("/tmp/latchkey");
    tokio::fs::create_dir_all(storage_root).await?;
    let wifi = load_or_seed_credentials(
        storage_root.join("wifi.conf"),
        &WifiCredentials::new("front-door-net", "changeme"),
    )
    .await?;
    info!(ssid = %wifi.ssid, "wifi credentials ready");

    let (pipeline, _pipeline_handle) = MockPipeline::new();
    let (transport, transport_handle) = MockTransport::new();
    let mqtt = MqttClient::new(
        transport,
        clock.clone(),
        MqttConfig {
            hardware_id: HardwareId::new("amb82-emulated")?,
            notify_topic: "doorlock/events".into(),
            command_topic: "doorlock/commands".into(),
        },
    );
    let uploader = UploadClient::new(UploadConfig {
        host: "127.0.0.1".into(),
        port: 9000,
        bucket: "/recordings/".into(),
    });
    let mut camera_node = CameraNode::new(
        Port::new(camera_io),
        VideoRecorder::new(pipeline, clock.clone(), storage_root),
        EventLogger::new(clock.clone()),
        mqtt,
        uploader,
    );
    camera_node.begin("amb82-emulated").await?;

    let tick = {
        let clock = clock.clone();
        move |ms: u64| clock.advance(ms)
    };

    info!("boards up, starting scripted scenario");

    // Warm-up: broker connects, sensor baselines settle
    sensor_node.tick().await?;
    camera_node.tick().await?;
    camera_node.tick().await?;

    // Scene 1: an enrolled finger unlocks the door
    info!("scene 1: fingerprint unlock");
    let slot = FingerprintId::new(3)?;
    fingerprint_handle.queue_matching_press(slot, 180);
    for _ in 0..4 {
        sensor_node.tick().await?;
        camera_node.tick().await?;
        tick(50);
    }
    info!(unlocked = sensor_node.is_unlocked(), melodies = ?buzzer_handle.played(), "scene 1 done");

    // Let the settle window and the unlock window pass
    tick(MATCH_SETTLE_MS + UNLOCK_DURATION_MS);
    sensor_node.tick().await?;

    // Scene 2: motion in front of the door starts a recording
    info!("scene 2: motion detection");
    motion_handle.push(700);
    tick(SENSOR_CHECK_INTERVAL_MS);
    sensor_node.tick().await?;
    camera_node.tick().await?;
    info!(recording = camera_node.is_recording(), "scene 2 done");

    // Scene 3: a remote unlock command arrives over the broker
    info!("scene 3: remote unlock");
    transport_handle.deliver("doorlock/commands", "unlock");
    camera_node.tick().await?;
    sensor_node.tick().await?;
    info!(unlocked = sensor_node.is_unlocked(), "scene 3 done");

    info!(
        notifications = transport_handle.publishes().len(),
        "scenario complete"
    );
    Ok(())
}
