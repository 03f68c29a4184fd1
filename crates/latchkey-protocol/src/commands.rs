//! Command opcodes for the inter-board serial protocol.
//!
//! This module defines every command byte exchanged between the camera node
//! and the sensor node over the serial link. The opcode occupies the second
//! byte of each frame, immediately after the header:
//!
//! ```text
//! [0xAA] [opcode] [len] [payload...] [checksum]
//!          ^^^^^^
//!          Command opcode position
//! ```
//!
//! # Command Categories
//!
//! ## Camera -> Sensor Node
//!
//! - `StartVideo` (0x01) / `StopVideo` (0x02): legacy video control echoes
//! - `Ack` (0x04): reserved acknowledgement slot (the link is best-effort
//!   and no current flow waits on it)
//! - `MqttMessage` (0x05): text payload relayed from the MQTT broker
//! - `Unlock` (0x06): remote unlock command
//! - `EnrollStart` (0x08): begin fingerprint enrollment into a given slot
//!
//! ## Sensor Node -> Camera
//!
//! - `SensorData` (0x03): periodic sensor readings
//! - `SensorEvent` (0x07): edge-triggered sensor event (motion, door)
//! - `EnrollSuccess` (0x50) / `EnrollFailure` (0x51): enrollment outcome
//! - `UnlockFingerprint` (0x52): an enrolled finger matched and the door
//!   was opened locally
//! - `PromptUser` (0x53): guidance prompt for the enrollment UI
//!
//! # Wire Format Examples
//!
//! Remote unlock (empty payload):
//! ```text
//! AA 06 00 06
//! ```
//!
//! Enrollment failure, timeout:
//! ```text
//! AA 51 01 01 53
//! ```

use latchkey_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command opcodes for serial link frames.
///
/// Each variant maps to a fixed wire byte. Unknown bytes are rejected at
/// decode time with [`Error::InvalidOpcode`], which causes the frame to be
/// dropped without desynchronizing the stream.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::Opcode;
///
/// let op = Opcode::parse(0x06).unwrap();
/// assert_eq!(op, Opcode::Unlock);
/// assert_eq!(op.as_u8(), 0x06);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Camera -> sensor node
    StartVideo,  // 0x01
    StopVideo,   // 0x02
    Ack,         // 0x04
    MqttMessage, // 0x05
    Unlock,      // 0x06
    EnrollStart, // 0x08

    // Sensor node -> camera
    SensorData,        // 0x03
    SensorEvent,       // 0x07
    EnrollSuccess,     // 0x50
    EnrollFailure,     // 0x51
    UnlockFingerprint, // 0x52
    PromptUser,        // 0x53
}

impl Opcode {
    pub fn parse(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(Opcode::StartVideo),
            0x02 => Ok(Opcode::StopVideo),
            0x03 => Ok(Opcode::SensorData),
            0x04 => Ok(Opcode::Ack),
            0x05 => Ok(Opcode::MqttMessage),
            0x06 => Ok(Opcode::Unlock),
            0x07 => Ok(Opcode::SensorEvent),
            0x08 => Ok(Opcode::EnrollStart),
            0x50 => Ok(Opcode::EnrollSuccess),
            0x51 => Ok(Opcode::EnrollFailure),
            0x52 => Ok(Opcode::UnlockFingerprint),
            0x53 => Ok(Opcode::PromptUser),
            _ => Err(Error::InvalidOpcode { code }),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::StartVideo => 0x01,
            Opcode::StopVideo => 0x02,
            Opcode::SensorData => 0x03,
            Opcode::Ack => 0x04,
            Opcode::MqttMessage => 0x05,
            Opcode::Unlock => 0x06,
            Opcode::SensorEvent => 0x07,
            Opcode::EnrollStart => 0x08,
            Opcode::EnrollSuccess => 0x50,
            Opcode::EnrollFailure => 0x51,
            Opcode::UnlockFingerprint => 0x52,
            Opcode::PromptUser => 0x53,
        }
    }

    /// True for opcodes originated by the sensor node.
    pub fn is_sensor_originated(&self) -> bool {
        matches!(
            self,
            Opcode::SensorData
                | Opcode::SensorEvent
                | Opcode::EnrollSuccess
                | Opcode::EnrollFailure
                | Opcode::UnlockFingerprint
                | Opcode::PromptUser
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::StartVideo => "START_VIDEO",
            Opcode::StopVideo => "STOP_VIDEO",
            Opcode::SensorData => "SENSOR_DATA",
            Opcode::Ack => "ACK",
            Opcode::MqttMessage => "MQTT_MSG",
            Opcode::Unlock => "UNLOCK",
            Opcode::SensorEvent => "SENSOR_EVENT",
            Opcode::EnrollStart => "ENROLL_START",
            Opcode::EnrollSuccess => "ENROLL_SUCCESS",
            Opcode::EnrollFailure => "ENROLL_FAILURE",
            Opcode::UnlockFingerprint => "UNLOCK_FP",
            Opcode::PromptUser => "PROMPT_USER",
        };
        write!(f, "{name}")
    }
}
