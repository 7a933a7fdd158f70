//! Wire Codec Error Types
//!
//! Core error types for frame and payload decoding.

use thiserror::Error;

/// Result type for econet-wire operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Wire-level decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Frame or payload could not be parsed
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame checksum did not match
    #[error("Checksum mismatch: calculated {calculated:#04X}, expected {expected:#04X}")]
    ChecksumMismatch { calculated: u8, expected: u8 },

    /// Sender type or protocol version is not the one this codec speaks
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

// Helper methods for creating errors
impl WireError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        WireError::MalformedFrame(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        WireError::UnsupportedProtocol(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WireError::malformed("short read");
        assert_eq!(err.to_string(), "Malformed frame: short read");

        let err = WireError::ChecksumMismatch {
            calculated: 0x12,
            expected: 0x34,
        };
        assert!(err.to_string().contains("0x12"));
        assert!(err.to_string().contains("0x34"));
    }
}
