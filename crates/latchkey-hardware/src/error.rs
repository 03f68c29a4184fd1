//! Error types for hardware operations.
//!
//! Covers the failure scenarios of the peripherals both boards drive: the
//! fingerprint module, GPIO-connected lock and buzzer, analog and digital
//! sensors, and the camera pipeline.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after the specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from the device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Fingerprint sensor returned an unexpected status code.
    #[error("Fingerprint sensor error: {message}")]
    FingerprintError { message: String },

    /// Template storage operation rejected by the sensor.
    #[error("Template storage failed: {message}")]
    TemplateStorageError { message: String },

    /// Camera or encoder pipeline fault.
    #[error("Pipeline error: {message}")]
    PipelineError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new fingerprint sensor error.
    pub fn fingerprint(message: impl Into<String>) -> Self {
        Self::FingerprintError {
            message: message.into(),
        }
    }

    /// Create a new template storage error.
    pub fn template_storage(message: impl Into<String>) -> Self {
        Self::TemplateStorageError {
            message: message.into(),
        }
    }

    /// Create a new pipeline error.
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::PipelineError {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("R503");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: R503");
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(20000);
        assert_eq!(error.to_string(), "Operation timeout after 20000ms");
    }

    #[test]
    fn test_fingerprint_error() {
        let error = HardwareError::fingerprint("bad packet");
        assert!(matches!(error, HardwareError::FingerprintError { .. }));
        assert_eq!(error.to_string(), "Fingerprint sensor error: bad packet");
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            HardwareError::disconnected("lock relay"),
            HardwareError::timeout(1000),
            HardwareError::pipeline("encoder stalled"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
