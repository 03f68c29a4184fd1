//! Shared domain types for the door lock system.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MAX_PAYLOAD_SIZE;
use crate::error::{Error, Result};

/// Unique hardware identifier for a camera node.
///
/// Carried in every MQTT notification so the backend can attribute events to
/// a physical device. Must be non-empty and at most 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareId(String);

impl HardwareId {
    /// Create a new hardware ID with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the ID is empty or longer than 64
    /// characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidValue("hardware ID cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(Error::InvalidValue(format!(
                "hardware ID too long: {} chars (max 64)",
                id.len()
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot number of a stored fingerprint template.
///
/// Slot 0 is reserved by the sensor firmware, so valid IDs are 1-127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintId(u8);

impl FingerprintId {
    /// Create a new fingerprint slot ID with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the slot is 0 or above 127.
    pub fn new(slot: u8) -> Result<Self> {
        if slot == 0 || slot > 127 {
            return Err(Error::InvalidValue(format!(
                "fingerprint slot out of range: {slot} (valid 1-127)"
            )));
        }
        Ok(Self(slot))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Reason an enrollment attempt failed.
///
/// The numeric codes travel as the single payload byte of an enrollment
/// failure message, so they are part of the wire contract between boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollError {
    /// A press or removal wait exceeded its deadline.
    Timeout,
    /// The two captures did not produce a coherent model.
    Mismatch,
    /// The sensor rejected the template store operation.
    StorageFailed,
    /// The sensor returned an unexpected error mid-sequence.
    SensorError,
}

impl EnrollError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Timeout => 0x01,
            Self::Mismatch => 0x02,
            Self::StorageFailed => 0x03,
            Self::SensorError => 0x04,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Timeout),
            0x02 => Some(Self::Mismatch),
            0x03 => Some(Self::StorageFailed),
            0x04 => Some(Self::SensorError),
            _ => None,
        }
    }
}

impl fmt::Display for EnrollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timed out waiting for finger",
            Self::Mismatch => "captures did not match",
            Self::StorageFailed => "template storage failed",
            Self::SensorError => "sensor error",
        };
        write!(f, "{s}")
    }
}

/// Guidance prompt sent to the user during enrollment.
///
/// Travels as the single payload byte of a prompt message; the camera node
/// forwards the text to whatever UI surface is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPrompt {
    PlaceFinger,
    RemoveFinger,
    PlaceAgain,
}

impl UserPrompt {
    pub fn code(&self) -> u8 {
        match self {
            Self::PlaceFinger => 0x01,
            Self::RemoveFinger => 0x02,
            Self::PlaceAgain => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::PlaceFinger),
            0x02 => Some(Self::RemoveFinger),
            0x03 => Some(Self::PlaceAgain),
            _ => None,
        }
    }
}

impl fmt::Display for UserPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlaceFinger => "place finger on sensor",
            Self::RemoveFinger => "remove finger",
            Self::PlaceAgain => "place the same finger again",
        };
        write!(f, "{s}")
    }
}

/// Security event categories shared by both boards.
///
/// The numeric codes travel as the single payload byte of a sensor event
/// message; the camera node maps them to recording and notification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Motion sensor crossed its threshold.
    MotionDetected,
    /// Door opened while unlocked.
    DoorOpened,
    /// Door opened while the lock was engaged.
    UnauthorizedDoorOpen,
    /// A finger press did not match any enrolled template.
    FingerprintFailure,
}

impl EventType {
    pub fn code(&self) -> u8 {
        match self {
            Self::MotionDetected => 0x01,
            Self::DoorOpened => 0x02,
            Self::UnauthorizedDoorOpen => 0x03,
            Self::FingerprintFailure => 0x04,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::MotionDetected),
            0x02 => Some(Self::DoorOpened),
            0x03 => Some(Self::UnauthorizedDoorOpen),
            0x04 => Some(Self::FingerprintFailure),
            _ => None,
        }
    }

    /// Short label used in event log descriptions and MQTT payloads.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MotionDetected => "motion_detected",
            Self::DoorOpened => "door_opened",
            Self::UnauthorizedDoorOpen => "unauthorized_door_open",
            Self::FingerprintFailure => "fingerprint_failure",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Validate a payload length against the frame limit.
pub fn validate_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            length: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}
