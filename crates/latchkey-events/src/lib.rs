//! Security event logging and event-driven recording policy.

pub mod handler;
pub mod logger;
pub mod traits;

pub use handler::EventHandler;
pub use logger::{EventLogger, EventRecord};
pub use traits::{MediaUploader, NotificationSink};
