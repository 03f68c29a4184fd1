//! MQTT notifications and media upload for the camera node.

pub mod mqtt;
pub mod upload;

pub use mqtt::{IncomingMessage, MockTransport, MockTransportHandle, MqttClient, MqttConfig, MqttTransport};
pub use upload::{UploadClient, UploadConfig};
