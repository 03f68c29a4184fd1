//! Serial link message representation and wire encoding.

use latchkey_core::constants::{FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, MSG_HEADER};
use latchkey_core::{EnrollError, Error, FingerprintId, Result, UserPrompt};
use serde::{Deserialize, Serialize};

use crate::commands::Opcode;

/// A decoded serial link message.
///
/// Wraps an opcode and its raw payload. The payload is opcode-specific and
/// at most [`MAX_PAYLOAD_SIZE`] bytes; validity is enforced at construction
/// so an existing `Message` always encodes to a legal frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    opcode: Opcode,
    payload: Vec<u8>,
}

impl Message {
    /// Create a message with payload validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`] bytes.
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                length: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { opcode, payload })
    }

    /// Create an empty-payload message. Always valid.
    pub fn empty(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    // Typed constructors for the fixed single-byte payloads.

    pub fn unlock() -> Self {
        Self::empty(Opcode::Unlock)
    }

    pub fn enroll_start(slot: FingerprintId) -> Self {
        Self {
            opcode: Opcode::EnrollStart,
            payload: vec![slot.value()],
        }
    }

    pub fn enroll_success(slot: FingerprintId) -> Self {
        Self {
            opcode: Opcode::EnrollSuccess,
            payload: vec![slot.value()],
        }
    }

    pub fn enroll_failure(reason: EnrollError) -> Self {
        Self {
            opcode: Opcode::EnrollFailure,
            payload: vec![reason.code()],
        }
    }

    pub fn unlock_fingerprint(slot: FingerprintId) -> Self {
        Self {
            opcode: Opcode::UnlockFingerprint,
            payload: vec![slot.value()],
        }
    }

    pub fn prompt(prompt: UserPrompt) -> Self {
        Self {
            opcode: Opcode::PromptUser,
            payload: vec![prompt.code()],
        }
    }

    pub fn sensor_event(code: u8) -> Self {
        Self {
            opcode: Opcode::SensorEvent,
            payload: vec![code],
        }
    }

    /// Text payload relayed from the MQTT broker. Truncated to the payload
    /// limit; the link carries short commands, not documents.
    pub fn mqtt_text(text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.truncate(MAX_PAYLOAD_SIZE);
        Self {
            opcode: Opcode::MqttMessage,
            payload: bytes,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// First payload byte, if any. Most sensor-node messages carry exactly
    /// one byte of payload.
    pub fn first_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Payload interpreted as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Frame checksum: opcode + length + payload bytes, modulo 256.
    pub fn checksum(&self) -> u8 {
        checksum(self.opcode.as_u8(), &self.payload)
    }

    /// Encode to the full wire frame including header and checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_OVERHEAD + self.payload.len());
        out.push(MSG_HEADER);
        out.push(self.opcode.as_u8());
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out.push(self.checksum());
        out
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Compute the frame checksum over an opcode byte and payload.
pub fn checksum(opcode: u8, payload: &[u8]) -> u8 {
    let mut sum = opcode.wrapping_add(payload.len() as u8);
    for &b in payload {
        sum = sum.wrapping_add(b);
    }
    sum
}
