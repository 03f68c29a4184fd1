//! Hardware abstraction layer for the door lock firmware pair.
//!
//! Defines the traits the control logic programs against and the mock
//! implementations used in tests and the emulated board harness.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{
    Buzzer, CaptureOutcome, CharBuffer, FingerprintModule, GpioPin, ModelOutcome, SearchOutcome,
    SensorInput,
};
pub use types::{Melody, PinState, SensorKind, SensorSample};
