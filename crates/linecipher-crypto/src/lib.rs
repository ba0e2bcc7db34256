//! Cipher set 1a
//!
//! Line encryption between two peers that each hold a long-term secp160r1
//! identity key. Every session also generates an ephemeral line key. Peers
//! exchange handshakes (authenticated messages announcing identity and line
//! key), then derive directional AES-128 keys for line packets.
//!
//! # Key Hierarchy
//!
//! ```text
//! identity (long-term)          line key (per session)
//!        │                             │
//!        ├── ECDH(identity, identity) ─┼──► message tag key ‖ IV
//!        │                             │
//!        └── ECDH(identity, line) ─────┼──► message payload key
//!                                      │
//!                 ECDH(line, line) ────┴──► line encryption / decryption keys
//!                                           token = SHA-256(line key)[..16]
//! ```
//!
//! Messages and handshakes: `line public key ‖ IV ‖ AES-128-CTR ‖ tag`.
//! Line packets: `recipient token ‖ nonce ‖ AES-128-CTR ‖ tag`. Tags are
//! HMAC-SHA256 folded to 4 bytes.
//!
//! # Security
//!
//! - Tags are compared in constant time. Curve arithmetic is not constant
//!   time.
//! - A four-byte tag bounds forgery resistance to 2^-32 per attempt.
//! - Message authentication binds both identities; payload confidentiality
//!   relies on the sender's line key.
//! - Shared secrets, derived keys and plaintext buffers are zeroized on drop.
//! - Decryption failures are undifferentiated: a caller cannot learn which
//!   check failed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod curve;
mod derivation;
pub mod entropy;
pub mod error;
pub mod handshake;
pub mod key;
pub mod message;
pub mod parts;
pub mod state;
pub mod suite;
pub mod token;

/// Cipher suite id of cipher set 1a.
pub const CSID: u8 = 0x1a;

pub use curve::{FIELD_SIZE, POINT_SIZE, SCALAR_SIZE};
pub use derivation::{KEY_SIZE, NONCE_SIZE, TAG_SIZE, TOKEN_SIZE};
pub use entropy::{Entropy, OsEntropy};
pub use error::CipherError;
pub use handshake::Handshake;
pub use key::KeyPair;
pub use message::{AT_FIELD, IV_SIZE, MESSAGE_OVERHEAD, decrypt_handshake, decrypt_message};
pub use parts::Parts;
pub use state::{CipherState, PACKET_OVERHEAD};
pub use suite::{CipherSuite, Cs1a, Registry};
pub use token::Token;
