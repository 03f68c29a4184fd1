//! Mock peripheral implementations for testing and development.
//!
//! Each mock comes as a `(device, handle)` pair: the device implements the
//! hardware trait and is handed to the code under test, while the handle
//! stays with the test to script sensor behavior and inspect what the code
//! did to the device.

mod buzzer;
mod fingerprint;
mod pin;
mod sensor;

pub use buzzer::{MockBuzzer, MockBuzzerHandle};
pub use fingerprint::{MockFingerprint, MockFingerprintHandle};
pub use pin::{MockPin, MockPinHandle};
pub use sensor::{MockSensor, MockSensorHandle};
