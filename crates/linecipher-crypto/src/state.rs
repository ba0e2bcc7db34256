//! Per-peer cipher state.
//!
//! A [`CipherState`] is created from the local identity key and immediately
//! generates an ephemeral line key. It then advances through three phases:
//!
//! ```text
//!   Unkeyed ──bind_remote_identity──► Identified
//!      │                                  │
//!      └──────────apply_handshake─────────┴──► LineEstablished
//!                                                   │   ▲
//!                                                   └───┘ apply_handshake
//!                                                         (new line key: rotate)
//! ```
//!
//! Each transition computes the next phase in full and then swaps it in under
//! one write lock, so a poisoned lock still holds a consistent phase.

use std::{
    fmt,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use linecipher_proto::Packet;
use zeroize::Zeroizing;

use crate::{
    CSID,
    curve::{self, POINT_SIZE},
    derivation::{self, NONCE_SIZE, SymmetricKey, TAG_SIZE, TOKEN_SIZE},
    entropy::{Entropy, OsEntropy},
    error::CipherError,
    handshake::Handshake,
    key::KeyPair,
    message::{self, IV_SIZE},
    parts::Parts,
    token::Token,
};

/// Bytes a line packet payload adds around the encoded inner packet.
pub const PACKET_OVERHEAD: usize = TOKEN_SIZE + NONCE_SIZE + TAG_SIZE;

const PACKET_PAYLOAD_OFFSET: usize = TOKEN_SIZE + NONCE_SIZE;

/// Symmetric material for an established line.
struct Line {
    remote_line: KeyPair,
    remote_token: Token,
    encryption_key: SymmetricKey,
    decryption_key: SymmetricKey,
}

/// What the state knows about the remote peer.
enum Session {
    Unkeyed,
    Identified { remote_identity: KeyPair },
    LineEstablished { remote_identity: KeyPair, line: Line },
}

impl Session {
    fn remote_identity(&self) -> Option<&KeyPair> {
        match self {
            Self::Unkeyed => None,
            Self::Identified { remote_identity } | Self::LineEstablished { remote_identity, .. } => {
                Some(remote_identity)
            },
        }
    }

    fn line(&self) -> Option<&Line> {
        match self {
            Self::LineEstablished { line, .. } => Some(line),
            _ => None,
        }
    }

    fn phase(&self) -> &'static str {
        match self {
            Self::Unkeyed => "unkeyed",
            Self::Identified { .. } => "identified",
            Self::LineEstablished { .. } => "line-established",
        }
    }
}

/// Encryption state shared with one remote peer.
///
/// # Invariants
///
/// - The local identity, line key and token never change after construction.
/// - Line keys and the remote token exist only together, and only once both
///   identities and both line keys are known.
/// - A bound remote identity is never replaced.
///
/// All methods take `&self`; the state can be shared across threads.
pub struct CipherState<E: Entropy = OsEntropy> {
    local_identity: KeyPair,
    local_line: KeyPair,
    local_line_public: [u8; POINT_SIZE],
    local_token: Token,
    session: RwLock<Session>,
    entropy: E,
}

impl CipherState<OsEntropy> {
    /// Create a state for `local_identity` using the OS random source.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if `local_identity` lacks either half
    /// - `Entropy` if the line key cannot be generated
    pub fn new(local_identity: &KeyPair) -> Result<Self, CipherError> {
        Self::with_entropy(local_identity, OsEntropy)
    }
}

impl<E: Entropy> CipherState<E> {
    /// Create a state for `local_identity` drawing randomness from `entropy`.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if `local_identity` lacks either half
    /// - `Entropy` if the line key cannot be generated
    pub fn with_entropy(local_identity: &KeyPair, entropy: E) -> Result<Self, CipherError> {
        if !local_identity.can_sign() || !local_identity.can_encrypt_to() {
            return Err(CipherError::InvalidKey);
        }

        let local_line = KeyPair::generate_with(&entropy)?;
        let Some(local_line_public) = local_line.public_bytes() else {
            unreachable!("generated key pairs carry a public point");
        };
        let local_token = Token::for_line_key(&local_line_public);

        Ok(Self {
            local_identity: local_identity.clone(),
            local_line,
            local_line_public,
            local_token,
            session: RwLock::new(Session::Unkeyed),
            entropy,
        })
    }

    /// Cipher suite of this state.
    pub fn csid(&self) -> u8 {
        CSID
    }

    /// Token the remote peer puts on packets addressed to us.
    pub fn local_token(&self) -> Token {
        self.local_token
    }

    /// Token we put on packets addressed to the remote peer.
    pub fn remote_token(&self) -> Option<Token> {
        self.read().line().map(|line| line.remote_token)
    }

    /// Public half of the bound remote identity.
    pub fn remote_identity(&self) -> Option<KeyPair> {
        self.read().remote_identity().cloned()
    }

    /// True until a remote identity is bound.
    pub fn needs_remote_identity(&self) -> bool {
        self.read().remote_identity().is_none()
    }

    /// True once a remote identity is bound.
    pub fn can_encrypt_message(&self) -> bool {
        !self.needs_remote_identity()
    }

    /// True once a remote identity is bound.
    pub fn can_decrypt_message(&self) -> bool {
        !self.needs_remote_identity()
    }

    /// True once a remote identity is bound.
    pub fn can_encrypt_handshake(&self) -> bool {
        !self.needs_remote_identity()
    }

    /// Always true: the local identity and line key exist from construction.
    pub fn can_decrypt_handshake(&self) -> bool {
        true
    }

    /// True once the line is established.
    pub fn can_encrypt_packet(&self) -> bool {
        self.read().line().is_some()
    }

    /// True once the line is established.
    pub fn can_decrypt_packet(&self) -> bool {
        self.read().line().is_some()
    }

    /// Bind the remote peer's identity. Only its public half is kept.
    ///
    /// Binding the identity that is already bound is a no-op.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if `remote_identity` has no public point
    /// - `InvalidState` if a different identity is already bound
    pub fn bind_remote_identity(&self, remote_identity: &KeyPair) -> Result<(), CipherError> {
        if !remote_identity.can_encrypt_to() {
            return Err(CipherError::InvalidKey);
        }

        let mut session = self.write();
        match session.remote_identity() {
            Some(bound) if bound.same_public(remote_identity) => Ok(()),
            Some(_) => Err(CipherError::InvalidState),
            None => {
                tracing::debug!(local_token = %self.local_token, "remote identity bound");
                *session = Session::Identified { remote_identity: remote_identity.public_only() };
                Ok(())
            },
        }
    }

    /// Apply an authenticated handshake from the remote peer.
    ///
    /// Binds the sender's identity if none is bound, then binds its line key
    /// and derives the line. A line key different from the one already bound
    /// rotates the line: the old keys and remote token are discarded and new
    /// ones derived.
    ///
    /// Returns `false`, leaving the state untouched, if the handshake comes
    /// from an identity other than the bound one.
    pub fn apply_handshake(&self, handshake: &Handshake) -> bool {
        let (Some(identity_point), Some(remote_line_public)) =
            (handshake.identity().point(), handshake.line_key().public_bytes())
        else {
            return false;
        };

        let mut session = self.write();

        let remote_identity = match session.remote_identity() {
            Some(bound) if !bound.same_public(handshake.identity()) => {
                tracing::warn!(
                    local_token = %self.local_token,
                    "handshake from a foreign identity rejected"
                );
                return false;
            },
            Some(bound) => bound.clone(),
            None => KeyPair::from_point(identity_point.clone()),
        };

        let rotating = match session.line() {
            Some(line) if line.remote_line.same_public(handshake.line_key()) => return true,
            Some(_) => true,
            None => false,
        };

        let Some(line) = self.derive_line(handshake.line_key(), &remote_line_public) else {
            return false;
        };

        if rotating {
            tracing::debug!(
                local_token = %self.local_token,
                remote_token = %line.remote_token,
                "line rotated"
            );
        } else {
            tracing::debug!(
                local_token = %self.local_token,
                remote_token = %line.remote_token,
                "line established"
            );
        }

        *session = Session::LineEstablished { remote_identity, line };
        true
    }

    /// Encrypt `plaintext` to the bound remote identity.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if no remote identity is bound
    /// - `Entropy` if the IV cannot be drawn
    pub fn encrypt_message(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let remote_identity = self.bound_identity()?;

        let mut iv = [0u8; IV_SIZE];
        self.entropy.fill(&mut iv)?;

        message::seal(&self.local_line, &self.local_identity, &remote_identity, plaintext, iv)
    }

    /// Verify and decrypt a message from the bound remote identity.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if no remote identity is bound
    /// - `InvalidMessage` if the message does not verify
    pub fn decrypt_message(&self, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let remote_identity = self.bound_identity()?;
        message::decrypt_message(&self.local_identity, &remote_identity, bytes)
    }

    /// Build a handshake announcing our identity and line key.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if no remote identity is bound
    /// - `Codec` if `parts` do not fit a packet header
    /// - `Entropy` if the IV cannot be drawn
    pub fn encrypt_handshake(&self, at: u32, parts: &Parts) -> Result<Vec<u8>, CipherError> {
        let Some(identity_public) = self.local_identity.public_bytes() else {
            unreachable!("local identity is checked for a public point at construction");
        };
        let plaintext = message::handshake_plaintext(identity_public, at, parts)?;
        self.encrypt_message(&plaintext)
    }

    /// Encrypt `inner` into a line packet for the remote peer.
    ///
    /// The result has an empty header and a body of
    /// `remote token ‖ nonce ‖ ciphertext ‖ tag`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the line is not established
    /// - `Codec` if `inner` cannot be encoded
    /// - `Entropy` if the nonce cannot be drawn
    pub fn encrypt_packet(&self, inner: &Packet) -> Result<Packet, CipherError> {
        let (remote_token, key) = {
            let session = self.read();
            let line = session.line().ok_or(CipherError::InvalidState)?;
            (line.remote_token, line.encryption_key.clone())
        };

        let encoded = Zeroizing::new(inner.encode()?);

        let mut nonce = [0u8; NONCE_SIZE];
        self.entropy.fill(&mut nonce)?;

        let mut body = Vec::with_capacity(PACKET_OVERHEAD + encoded.len());
        body.extend_from_slice(remote_token.as_bytes());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&encoded);
        derivation::apply_keystream(&key, nonce, &mut body[PACKET_PAYLOAD_OFFSET..]);

        let tag =
            derivation::tag(&[key.as_bytes().as_slice(), nonce.as_slice()], &body[TOKEN_SIZE..]);
        body.extend_from_slice(&tag);

        Ok(Packet::with_body(body))
    }

    /// Authenticate and decrypt a line packet from the remote peer.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the line is not established
    /// - `InvalidPacket` if the envelope has a header, is too short, is
    ///   addressed to another token or fails authentication
    /// - `Codec` if the decrypted inner packet does not decode
    pub fn decrypt_packet(&self, outer: &Packet) -> Result<Packet, CipherError> {
        let key = {
            let session = self.read();
            let line = session.line().ok_or(CipherError::InvalidState)?;
            line.decryption_key.clone()
        };

        if !outer.header.is_empty() || outer.body.len() < PACKET_OVERHEAD {
            return Err(CipherError::InvalidPacket);
        }

        let Some((token, rest)) = outer.body.split_first_chunk::<TOKEN_SIZE>() else {
            return Err(CipherError::InvalidPacket);
        };
        if Token::from_bytes(*token) != self.local_token {
            return Err(CipherError::InvalidPacket);
        }

        let Some((signed, received_tag)) = rest.split_last_chunk::<TAG_SIZE>() else {
            return Err(CipherError::InvalidPacket);
        };
        let Some((nonce, ciphertext)) = signed.split_first_chunk::<NONCE_SIZE>() else {
            return Err(CipherError::InvalidPacket);
        };

        let expected = derivation::tag(&[key.as_bytes().as_slice(), nonce.as_slice()], signed);
        if !derivation::tags_match(received_tag, expected) {
            return Err(CipherError::InvalidPacket);
        }

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        derivation::apply_keystream(&key, *nonce, &mut plaintext);

        Ok(Packet::decode(&plaintext)?)
    }

    /// True if our identity's x-coordinate is numerically greater than the
    /// remote identity's. False while no remote identity is bound.
    ///
    /// Exactly one side of a session is high, so peers can break ties
    /// without negotiating.
    pub fn is_high(&self) -> bool {
        let session = self.read();
        match (self.local_identity.point(), session.remote_identity().and_then(KeyPair::point)) {
            (Some(local), Some(remote)) => local.x() > remote.x(),
            _ => false,
        }
    }

    fn bound_identity(&self) -> Result<KeyPair, CipherError> {
        self.read().remote_identity().cloned().ok_or(CipherError::InvalidState)
    }

    /// Derive line material for `remote_line`. `None` only if ECDH yields the
    /// point at infinity, which a valid local line scalar never does.
    fn derive_line(
        &self,
        remote_line: &KeyPair,
        remote_line_public: &[u8; POINT_SIZE],
    ) -> Option<Line> {
        let shared = curve::shared_secret(remote_line.point()?, self.local_line.scalar()?)?;
        let (encryption_key, decryption_key) =
            derivation::line_keys(shared.as_slice(), &self.local_line_public, remote_line_public);

        Some(Line {
            remote_line: remote_line.public_only(),
            remote_token: Token::for_line_key(remote_line_public),
            encryption_key,
            decryption_key,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Entropy> fmt::Debug for CipherState<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.read();
        f.debug_struct("CipherState")
            .field("phase", &session.phase())
            .field("local_token", &self.local_token)
            .field("remote_token", &session.line().map(|line| line.remote_token))
            .finish_non_exhaustive()
    }
}
