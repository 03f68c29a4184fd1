//! Persistent configuration for the camera node.

pub mod credentials;

pub use credentials::WifiCredentials;
