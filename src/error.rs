//! Error types for the essence streaming pipeline

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Block framing errors
///
/// Always recoverable: the reader resolves them by discarding bytes and
/// resynchronizing on the next sync marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("bad sync marker {0:#010x}")]
    BadSync(u32),

    #[error("truncated block: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Transport (socket) errors
///
/// Setup failures are fatal to the endpoint and surfaced to the caller.
/// Transient send blocking is recovered inside the writer and never
/// reaches this type.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("socket setup failed: {0}")]
    Setup(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("send stalled: chunk retried {retries} times against a saturated link")]
    Saturated { retries: u32 },

    #[error("writer is not open")]
    NotOpen,
}

/// Control-channel payload errors
///
/// The offending block is dropped and logged; processing continues.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("malformed control payload: {0}")]
    Malformed(String),

    #[error("invalid embedded image data: {0}")]
    Image(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
