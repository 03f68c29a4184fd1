//! Core constants for the Latchkey door lock firmware pair.
//!
//! This module defines the protocol-level and timing constants shared by both
//! boards of the system: the camera/network node and the sensor/lock node.
//! Centralizing them keeps the two sides of the serial link in agreement and
//! documents every tunable in one place.
//!
//! # Wire Format
//!
//! The inter-board serial protocol uses a fixed binary frame:
//!
//! ```text
//! [0xAA] [cmd:1] [len:1] [payload:0..=64] [checksum:1]
//! ```
//!
//! Where:
//! - `0xAA` - Frame header sentinel ([`MSG_HEADER`])
//! - `cmd` - Command opcode from a closed enum
//! - `len` - Payload length (0-64)
//! - `checksum` - `(cmd + len + sum(payload)) mod 256`
//!
//! # Reliability Model
//!
//! The link is best-effort: no ACK or retry at the framing layer, no sequence
//! numbers, no ordering guarantee across boards. Consumers must tolerate
//! dropped and duplicated application messages. Modifying the constants below
//! changes the timing envelope of both boards; keep them paired.

// ============================================================================
// Message Framing
// ============================================================================

/// Frame header sentinel byte.
///
/// Every message on the inter-board serial link starts with this byte. The
/// receiver scans forward to the next header byte to resynchronize after
/// garbage or a corrupt frame.
///
/// # Examples
///
/// ```
/// use latchkey_core::constants::MSG_HEADER;
///
/// let frame = [MSG_HEADER, 0x06, 0x00, 0x06];
/// assert_eq!(frame[0], 0xAA);
/// ```
pub const MSG_HEADER: u8 = 0xAA;

/// Maximum payload length in bytes.
///
/// A `len` field claiming more than this is treated as a framing error: the
/// receiver drains the claimed length plus the checksum byte to stay aligned
/// with the stream, then reports failure.
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Fixed frame overhead in bytes (header + opcode + length + checksum).
pub const FRAME_OVERHEAD: usize = 4;

/// Per-stage receive timeout (milliseconds).
///
/// Each stage of a frame read (header group, each payload byte, checksum)
/// may stall at most this long before the read attempt is abandoned. A
/// partially received frame is dropped, never buffered for the next attempt.
///
/// # Value: 50ms
pub const BYTE_TIMEOUT_MS: u64 = 50;

// ============================================================================
// Fingerprint Timing
// ============================================================================

/// Poll interval for finger-presence detection while idle (milliseconds).
///
/// The matching state machine probes the sensor at most once per interval to
/// avoid saturating the sensor bus. Once a finger is detected, the remaining
/// match states execute back-to-back without artificial delay.
pub const MATCH_POLL_INTERVAL_MS: u64 = 50;

/// Settle delay after a successful match (milliseconds).
///
/// Prevents the same finger press from re-triggering an unlock immediately.
/// Modeled as an explicit state with a resume deadline, not a blocking sleep.
pub const MATCH_SETTLE_MS: u64 = 1000;

/// Timeout for each finger-press wait during enrollment (milliseconds).
///
/// Applies to both the first and second press. Exceeding it aborts the
/// enrollment with error code [`EnrollError::Timeout`](crate::EnrollError).
///
/// # Value: 20 seconds
pub const ENROLL_PRESS_TIMEOUT_MS: u64 = 20_000;

/// Timeout for the finger-removal wait between enrollment captures.
///
/// # Value: 5 seconds
pub const ENROLL_REMOVE_TIMEOUT_MS: u64 = 5_000;

/// How long the lock stays open after an authorized event (milliseconds).
pub const UNLOCK_DURATION_MS: u64 = 3000;

// ============================================================================
// Sensor Polling
// ============================================================================

/// Interval between periodic sensor sweeps on the sensor node (milliseconds).
pub const SENSOR_CHECK_INTERVAL_MS: u64 = 1000;

/// Analog threshold above which the motion sensor reading counts as motion.
pub const MOTION_THRESHOLD: u16 = 500;

/// Maximum number of sensors the sensor manager will register.
pub const MAX_SENSORS: usize = 8;

// ============================================================================
// Event Logger
// ============================================================================

/// Capacity of the circular event buffer.
///
/// Once full, the oldest entry is silently overwritten. Three slots is
/// deliberate: the buffer only needs to cover the events of a single
/// recording cycle before `clear()` resets it.
pub const MAX_EVENT_SLOTS: usize = 3;

/// Maximum stored length of an event description (characters).
pub const EVENT_DESCRIPTION_MAX: usize = 31;

/// Length at which the event summary truncates with an "and N more" suffix.
pub const EVENT_SUMMARY_LIMIT: usize = 200;

// ============================================================================
// Video Recording
// ============================================================================

/// Grace period after starting the encoder before an Idle encoder state is
/// treated as a hardware error (milliseconds).
pub const ENCODER_ERROR_GRACE_MS: u64 = 500;

/// Recording duration for motion and unauthorized-door events (milliseconds).
pub const RECORDING_DURATION_LONG_MS: u64 = 10_000;

/// Recording duration for fingerprint-failure events (milliseconds).
pub const RECORDING_DURATION_SHORT_MS: u64 = 5_000;

// ============================================================================
// MQTT Reconnection
// ============================================================================

/// Minimum interval between MQTT reconnect attempts (milliseconds).
///
/// # Value: 5 seconds
pub const MQTT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Maximum consecutive reconnect attempts before backing off.
pub const MQTT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Cool-down multiplier applied to [`MQTT_RECONNECT_INTERVAL_MS`] once the
/// attempt cap is reached. After the extended cool-down elapses, the attempt
/// counter resets to zero and reconnection resumes.
pub const MQTT_COOLDOWN_FACTOR: u64 = 4;

// ============================================================================
// HTTP Upload
// ============================================================================

/// Chunk size for streaming a file body over the upload connection (bytes).
pub const UPLOAD_CHUNK_SIZE: usize = 1024;

/// Consecutive failed writes tolerated per chunk before the upload aborts.
pub const UPLOAD_MAX_WRITE_RETRIES: u32 = 3;

/// Overall wall-clock cap on a single upload (milliseconds).
///
/// # Value: 10 minutes (large video files on a slow link)
pub const UPLOAD_TIMEOUT_MS: u64 = 600_000;

/// How long to wait for the response status line after the body is sent.
///
/// # Value: 20 seconds
pub const UPLOAD_RESPONSE_TIMEOUT_MS: u64 = 20_000;

/// How long to wait for a `100-continue` or early error after the headers.
///
/// # Value: 3 seconds
pub const UPLOAD_HANDSHAKE_TIMEOUT_MS: u64 = 3000;
