//! Cipher suite facade and registry.
//!
//! A [`CipherSuite`] is the entry point a transport uses before any session
//! exists: it creates keys and sessions, and opens messages and handshakes
//! from peers it has no state for yet. The [`Registry`] maps cipher suite
//! ids to suites. It is an ordinary value owned by the caller.

use std::{collections::BTreeMap, fmt, sync::Arc};

use zeroize::Zeroizing;

use crate::{
    CSID,
    error::CipherError,
    handshake::Handshake,
    key::KeyPair,
    message,
    state::CipherState,
};

/// Operations a cipher suite offers before a session exists.
pub trait CipherSuite: Send + Sync {
    /// One-byte cipher suite id.
    fn csid(&self) -> u8;

    /// Generate a fresh identity key.
    fn generate_key(&self) -> Result<KeyPair, CipherError>;

    /// Build key material from raw encodings. Either slice may be empty.
    fn decode_key(&self, public: &[u8], private: &[u8]) -> Result<KeyPair, CipherError>;

    /// Create a session state for `local`, which must carry both halves.
    fn new_session(&self, local: &KeyPair) -> Result<CipherState, CipherError>;

    /// Verify and decrypt a message from `remote`.
    fn decrypt_message(
        &self,
        local: &KeyPair,
        remote: &KeyPair,
        bytes: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CipherError>;

    /// Decrypt and authenticate a handshake from an unknown peer.
    fn decrypt_handshake(&self, local: &KeyPair, bytes: &[u8]) -> Result<Handshake, CipherError>;
}

/// Cipher set 1a: secp160r1, AES-128-CTR, HMAC-SHA256 folded to 4 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cs1a;

impl CipherSuite for Cs1a {
    fn csid(&self) -> u8 {
        CSID
    }

    fn generate_key(&self) -> Result<KeyPair, CipherError> {
        KeyPair::generate()
    }

    fn decode_key(&self, public: &[u8], private: &[u8]) -> Result<KeyPair, CipherError> {
        KeyPair::from_bytes(public, private)
    }

    fn new_session(&self, local: &KeyPair) -> Result<CipherState, CipherError> {
        CipherState::new(local)
    }

    fn decrypt_message(
        &self,
        local: &KeyPair,
        remote: &KeyPair,
        bytes: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        message::decrypt_message(local, remote, bytes)
    }

    fn decrypt_handshake(&self, local: &KeyPair, bytes: &[u8]) -> Result<Handshake, CipherError> {
        message::decrypt_handshake(local, bytes)
    }
}

/// Cipher suites by id.
#[derive(Default, Clone)]
pub struct Registry {
    suites: BTreeMap<u8, Arc<dyn CipherSuite>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every suite this crate implements.
    pub fn with_defaults() -> Self {
        let mut suites: BTreeMap<u8, Arc<dyn CipherSuite>> = BTreeMap::new();
        suites.insert(CSID, Arc::new(Cs1a));
        Self { suites }
    }

    /// Add a suite under its own csid.
    ///
    /// # Errors
    ///
    /// `DuplicateSuite` if a suite with the same csid is already registered.
    /// The existing entry is kept.
    pub fn register(&mut self, suite: Arc<dyn CipherSuite>) -> Result<(), CipherError> {
        let csid = suite.csid();
        if self.suites.contains_key(&csid) {
            return Err(CipherError::DuplicateSuite { csid });
        }
        self.suites.insert(csid, suite);
        Ok(())
    }

    /// Suite registered for `csid`.
    pub fn get(&self, csid: u8) -> Option<&Arc<dyn CipherSuite>> {
        self.suites.get(&csid)
    }

    /// Registered csids in ascending order.
    pub fn csids(&self) -> impl Iterator<Item = u8> + '_ {
        self.suites.keys().copied()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.suites.keys().map(|csid| format!("{csid:02x}"))).finish()
    }
}
