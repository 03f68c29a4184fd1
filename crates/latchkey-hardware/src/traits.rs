//! Hardware device trait definitions.
//!
//! This module defines trait interfaces for the peripherals driven by the
//! two firmware boards: the fingerprint module, GPIO outputs (lock relay,
//! LEDs), sensors and the buzzer. These traits establish the contract
//! between the control logic and the devices, enabling substitution between
//! mock and real hardware implementations.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro. They are NOT
//! object-safe; use generic type parameters at call sites.

#![allow(async_fn_in_trait)]

use latchkey_core::FingerprintId;

use crate::error::Result;
use crate::types::{Melody, PinState, SensorKind};

/// Outcome of a capture attempt on the fingerprint module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// An image was captured into the sensor's image buffer.
    Captured,
    /// No finger on the window; not an error.
    NoFinger,
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured)
    }
}

/// Outcome of combining the two enrollment captures into a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOutcome {
    /// The two captures agree and a template was built.
    Created,
    /// The captures came from different fingers or shifted placements.
    Mismatch,
}

/// Outcome of a database search against the live capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A stored template matched.
    Match {
        slot: FingerprintId,
        /// Sensor-reported confidence score.
        score: u16,
    },
    /// No stored template was close enough.
    NoMatch,
}

impl SearchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

/// Character buffer slot of the fingerprint module.
///
/// Enrollment captures two images into separate buffers so the module can
/// cross-check them when building the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBuffer {
    One,
    Two,
}

/// Fingerprint module abstraction.
///
/// Models the command set of a serial optical fingerprint module (R503
/// class): capture an image, convert it into one of two character buffers,
/// build a model from the buffer pair, store it to a numbered slot, and
/// search the stored database against a live capture.
///
/// The matching and enrollment state machines drive these methods one step
/// at a time; no method blocks waiting for a finger. [`capture_image`]
/// returns [`CaptureOutcome::NoFinger`] immediately when the window is
/// empty, and the caller decides how often to poll.
///
/// # Errors
///
/// All methods surface sensor communication faults and unexpected status
/// codes as errors; expected negative outcomes (no finger, no match,
/// capture mismatch) are values, not errors.
///
/// [`capture_image`]: FingerprintModule::capture_image
pub trait FingerprintModule: Send {
    /// Attempt to capture a fingerprint image.
    async fn capture_image(&mut self) -> Result<CaptureOutcome>;

    /// Convert the captured image into the given character buffer.
    async fn process_image(&mut self, buffer: CharBuffer) -> Result<()>;

    /// Combine both character buffers into a template model.
    async fn create_model(&mut self) -> Result<ModelOutcome>;

    /// Store the current model into a numbered flash slot.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::TemplateStorageError`] if the sensor
    /// rejects the write.
    ///
    /// [`HardwareError::TemplateStorageError`]: crate::HardwareError::TemplateStorageError
    async fn store_model(&mut self, slot: FingerprintId) -> Result<()>;

    /// Search the stored database against character buffer one.
    async fn search(&mut self) -> Result<SearchOutcome>;

    /// Delete the template in the given slot.
    async fn delete_model(&mut self, slot: FingerprintId) -> Result<()>;

    /// Number of templates currently stored.
    async fn template_count(&mut self) -> Result<u16>;
}

/// A single GPIO output pin.
///
/// Drives the lock relay and status LEDs. Deliberately minimal: the lock
/// controller owns all timing, the pin just switches.
pub trait GpioPin: Send {
    async fn set_high(&mut self) -> Result<()>;

    async fn set_low(&mut self) -> Result<()>;

    /// Current driven state of the pin.
    async fn state(&self) -> Result<PinState>;
}

/// A sensor input channel.
///
/// Analog sensors report their raw reading; digital contacts report 0 or 1.
/// Interpretation (thresholds, edges) happens in the sensor manager.
pub trait SensorInput: Send {
    /// What this channel measures.
    fn kind(&self) -> SensorKind;

    /// Take one raw sample.
    async fn sample(&mut self) -> Result<u16>;
}

/// Piezo buzzer abstraction.
pub trait Buzzer: Send {
    /// Play a melody to completion.
    async fn play(&mut self, melody: Melody) -> Result<()>;
}
