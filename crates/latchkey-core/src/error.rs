use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid command opcode: 0x{code:02X}")]
    InvalidOpcode { code: u8 },

    #[error("Payload too large: {length} bytes (max {max})")]
    PayloadTooLarge { length: usize, max: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Receive timeout during {stage}")]
    ReceiveTimeout { stage: &'static str },

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Operation busy: {0}")]
    Busy(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    // Hardware errors
    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    // Network errors
    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid field value: {0}")]
    InvalidValue(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
