//! Fingerprint matching and enrollment logic for the sensor node.
//!
//! Both flows are modeled as explicit state machines that advance one state
//! per `update()` call against an injected clock, share a single sensor
//! borrowed per call, and return [`Effect`]s instead of driving hardware or
//! the serial link themselves.

pub mod effect;
pub mod enrollment;
pub mod matching;

pub use effect::Effect;
pub use enrollment::{EnrollState, EnrollmentMachine};
pub use matching::{MatchState, MatchingConfig, MatchingMachine};
