//! Integration tests for the frame codec over async transports.
//!
//! Exercises [`FrameCodec`] through Tokio's `Framed` wrapper and the
//! byte-level [`Port`], simulating both boards of the serial link with an
//! in-process duplex pipe.

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Framed;

use latchkey_core::{EnrollError, FingerprintId, UserPrompt};
use latchkey_protocol::{FrameCodec, Message, Opcode, Port};

#[tokio::test]
async fn framed_roundtrip_between_boards() {
    let (camera_io, sensor_io) = tokio::io::duplex(1024);
    let mut camera = Framed::new(camera_io, FrameCodec::new());
    let mut sensor = Framed::new(sensor_io, FrameCodec::new());

    // Camera commands an enrollment
    let slot = FingerprintId::new(3).unwrap();
    camera.send(Message::enroll_start(slot)).await.unwrap();

    let cmd = sensor.next().await.unwrap().unwrap();
    assert_eq!(cmd.opcode(), Opcode::EnrollStart);
    assert_eq!(cmd.first_byte(), Some(3));

    // Sensor walks the enrollment dialogue
    sensor
        .send(Message::prompt(UserPrompt::PlaceFinger))
        .await
        .unwrap();
    sensor
        .send(Message::prompt(UserPrompt::RemoveFinger))
        .await
        .unwrap();
    sensor.send(Message::enroll_success(slot)).await.unwrap();

    let prompt1 = camera.next().await.unwrap().unwrap();
    assert_eq!(prompt1.opcode(), Opcode::PromptUser);
    assert_eq!(
        UserPrompt::from_code(prompt1.first_byte().unwrap()),
        Some(UserPrompt::PlaceFinger)
    );

    let prompt2 = camera.next().await.unwrap().unwrap();
    assert_eq!(
        UserPrompt::from_code(prompt2.first_byte().unwrap()),
        Some(UserPrompt::RemoveFinger)
    );

    let done = camera.next().await.unwrap().unwrap();
    assert_eq!(done.opcode(), Opcode::EnrollSuccess);
    assert_eq!(done.first_byte(), Some(3));
}

#[tokio::test]
async fn corrupt_frame_between_valid_ones_is_skipped() {
    let (mut raw, codec_io) = tokio::io::duplex(1024);
    let mut framed = Framed::new(codec_io, FrameCodec::new());

    let valid = Message::enroll_failure(EnrollError::StorageFailed).encode();
    let mut corrupted = Message::unlock().encode();
    *corrupted.last_mut().unwrap() ^= 0x10;

    raw.write_all(&corrupted).await.unwrap();
    raw.write_all(&valid).await.unwrap();
    raw.flush().await.unwrap();

    // The corrupt unlock never surfaces; the failure message does.
    let msg = framed.next().await.unwrap().unwrap();
    assert_eq!(msg.opcode(), Opcode::EnrollFailure);
    assert_eq!(
        EnrollError::from_code(msg.first_byte().unwrap()),
        Some(EnrollError::StorageFailed)
    );
}

#[tokio::test]
async fn port_and_framed_interoperate() {
    let (port_io, framed_io) = tokio::io::duplex(1024);
    let mut port = Port::new(port_io);
    let mut framed = Framed::new(framed_io, FrameCodec::new());

    port.send(&Message::mqtt_text("doorbell")).await.unwrap();

    let msg = framed.next().await.unwrap().unwrap();
    assert_eq!(msg.opcode(), Opcode::MqttMessage);
    assert_eq!(msg.text(), "doorbell");

    framed
        .send(Message::sensor_event(0x01))
        .await
        .unwrap();

    let evt = port.recv().await.unwrap();
    assert_eq!(evt.opcode(), Opcode::SensorEvent);
    assert_eq!(evt.first_byte(), Some(0x01));
}
