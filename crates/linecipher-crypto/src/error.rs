//! Error types for cipher set 1a operations

use linecipher_proto::ProtocolError;
use thiserror::Error;

/// Errors from key handling, handshakes, messages and line packets.
///
/// Message and packet failures are deliberately coarse: a malformed envelope,
/// a bad curve point and a forged tag all surface as the same variant so a
/// peer cannot tell which check it tripped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key material is malformed or lacks a required half
    #[error("invalid key")]
    InvalidKey,

    /// Message or handshake failed to decode or authenticate
    #[error("invalid message")]
    InvalidMessage,

    /// Operation attempted before the required key material exists
    #[error("invalid state")]
    InvalidState,

    /// Line packet failed to decode or authenticate
    #[error("invalid packet")]
    InvalidPacket,

    /// The randomness source could not produce bytes
    #[error("entropy source failed: {reason}")]
    Entropy {
        /// Description from the underlying source
        reason: String,
    },

    /// Inner packet could not be encoded or decoded
    #[error("packet codec: {0}")]
    Codec(#[from] ProtocolError),

    /// A cipher suite with this id is already registered
    #[error("cipher suite {csid:#04x} already registered")]
    DuplicateSuite {
        /// The conflicting cipher suite id
        csid: u8,
    },
}

impl CipherError {
    /// Returns true if the error means untrusted input was rejected.
    ///
    /// These are expected on a hostile network: drop the input and keep the
    /// session. Everything else points at a local problem (missing keys, a
    /// broken entropy source, caller sequencing).
    pub fn is_rejected_input(&self) -> bool {
        matches!(self, Self::InvalidMessage | Self::InvalidPacket | Self::Codec(_))
    }
}
