//! Collaborator seams for event handling.
//!
//! The network layer implements both traits; event handling stays testable
//! against in-memory fakes.

#![allow(async_fn_in_trait)]

use std::path::Path;

use latchkey_core::{EventType, Result};

/// Uploads a recorded clip and returns its public URL.
pub trait MediaUploader {
    async fn upload_file(&mut self, path: &Path) -> Result<String>;
}

/// Publishes a security notification upstream.
pub trait NotificationSink {
    /// `media_url` is empty when no clip accompanies the event.
    async fn notify(
        &mut self,
        event: EventType,
        description: &str,
        media_url: &str,
    ) -> Result<()>;
}
