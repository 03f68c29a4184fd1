//! Lock relay control and sensor polling for the sensor node.

pub mod controller;
pub mod sensors;

pub use controller::LockController;
pub use sensors::{SensorEvent, SensorManager};
