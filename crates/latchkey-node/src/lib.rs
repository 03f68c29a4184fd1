//! Board composition for the firmware pair.
//!
//! Wires the protocol, hardware, lock, fingerprint, video, event and
//! network layers into the two boards and their debug shells. Each board is
//! a plain struct driven by `tick()`; the caller owns the loop cadence.

pub mod camera_node;
pub mod sensor_node;
pub mod shell;

pub use camera_node::{camera_shell, load_or_seed_credentials, CameraNode, CameraShellAction};
pub use sensor_node::{sensor_shell, SensorNode, SensorShellAction};
pub use shell::{Dispatch, Shell};
