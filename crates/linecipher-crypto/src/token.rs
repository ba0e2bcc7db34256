//! Line tokens: public 16-byte identifiers that route line packets.

use std::fmt;

use crate::{
    curve::POINT_SIZE,
    derivation::{TOKEN_SIZE, token_digest},
};

/// Identifier derived from a line public key.
///
/// A line packet starts with the recipient's token, so a receiver can match
/// the packet to its session before doing any cryptography. Tokens are
/// public and safe to log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token([u8; TOKEN_SIZE]);

impl Token {
    /// The all-zero token. Never produced by a real line key in practice.
    pub const ZERO: Self = Self([0u8; TOKEN_SIZE]);

    /// Size of a token on the wire.
    pub const SIZE: usize = TOKEN_SIZE;

    /// Wrap raw token bytes.
    pub const fn from_bytes(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw token bytes.
    pub const fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }

    /// Token addressed by a line packet payload, if it is long enough to
    /// carry one.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        payload.first_chunk::<TOKEN_SIZE>().copied().map(Self)
    }

    pub(crate) fn for_line_key(line_public: &[u8; POINT_SIZE]) -> Self {
        Self(token_digest(line_public))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
