//! Client Error Types
//!
//! Core error types for the connection, driver and device layers.

use thiserror::Error;

/// Result type for econet-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client errors
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Wire-level decoding failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] econet_wire::WireError),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Parameter write rejected before transmission
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Requested key or device is not known
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// Invalid argument from the caller
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection was closed while waiting
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

// Helper methods for creating errors
impl Error {
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Error::InvalidData(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn not_available(msg: impl Into<String>) -> Self {
        Error::NotAvailable(msg.into())
    }

    /// Check if this error indicates a need for reconnection
    pub fn needs_reconnect(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Connection(_) => true,
            Error::NotConnected => true,
            Error::Timeout(msg) => msg.contains("keep-alive"),
            _ => false,
        }
    }

    /// Single-frame faults that leave the stream usable
    pub fn is_frame_fault(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}
