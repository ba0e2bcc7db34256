//! Decrypted handshake messages.

use crate::{CSID, key::KeyPair, parts::Parts};

/// An authenticated handshake from a remote peer.
///
/// Produced by decrypting a handshake envelope and consumed by
/// [`CipherState::apply_handshake`](crate::CipherState::apply_handshake).
/// Both keys carry only their public halves.
#[derive(Debug, Clone)]
pub struct Handshake {
    identity: KeyPair,
    line_key: KeyPair,
    at: u32,
    parts: Parts,
}

impl Handshake {
    pub(crate) fn new(identity: KeyPair, line_key: KeyPair, at: u32, parts: Parts) -> Self {
        Self { identity, line_key, at, parts }
    }

    /// Sender's long-term identity key.
    pub fn identity(&self) -> &KeyPair {
        &self.identity
    }

    /// Sender's ephemeral line key.
    pub fn line_key(&self) -> &KeyPair {
        &self.line_key
    }

    /// Sender-chosen handshake timestamp.
    pub fn at(&self) -> u32 {
        self.at
    }

    /// Routing attributes announced by the sender.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Cipher suite of this handshake.
    pub fn csid(&self) -> u8 {
        CSID
    }
}
