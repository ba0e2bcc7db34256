//! Error types for packet framing.

use thiserror::Error;

/// Result alias for framing operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding a [`crate::Packet`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before the length prefix or the header it announces
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Encoded header does not fit the 16-bit length prefix
    #[error("header too large: {size} bytes (max {max})")]
    HeaderTooLarge {
        /// Encoded header size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Header bytes are not a JSON object
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
