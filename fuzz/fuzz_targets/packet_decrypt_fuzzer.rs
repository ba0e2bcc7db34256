//! Fuzz target for line packet decryption
//!
//! Feeds adversarial envelopes to an established session.
//!
//! # Strategy
//!
//! - Fully arbitrary outer packets (header and body)
//! - Authentic envelopes with bytes flipped, truncated or extended
//! - Authentic envelopes with the recipient token kept intact
//!
//! # Invariants
//!
//! - Decryption never panics
//! - Unmodified envelopes always decrypt to the original inner packet
//! - Any modification is rejected as `InvalidPacket`
//! - Rejected input leaves the session able to decrypt authentic packets

#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use linecipher_crypto::{CipherError, CipherState, KeyPair, Parts, decrypt_handshake};
use linecipher_proto::{Header, Packet};

struct Line {
    sender: CipherState,
    receiver: CipherState,
}

static LINE: LazyLock<Line> = LazyLock::new(|| {
    let sender_identity = KeyPair::generate().unwrap();
    let receiver_identity = KeyPair::generate().unwrap();
    let sender = CipherState::new(&sender_identity).unwrap();
    let receiver = CipherState::new(&receiver_identity).unwrap();

    sender.bind_remote_identity(&receiver_identity).unwrap();
    receiver.bind_remote_identity(&sender_identity).unwrap();
    let to_receiver = sender.encrypt_handshake(0, &Parts::new()).unwrap();
    let to_sender = receiver.encrypt_handshake(0, &Parts::new()).unwrap();
    assert!(receiver.apply_handshake(&decrypt_handshake(&receiver_identity, &to_receiver).unwrap()));
    assert!(sender.apply_handshake(&decrypt_handshake(&sender_identity, &to_sender).unwrap()));

    Line { sender, receiver }
});

#[derive(Debug, Arbitrary)]
enum Scenario {
    /// Arbitrary outer packet
    Raw { header_field: Option<(String, String)>, body: Vec<u8> },
    /// Authentic envelope, then mutated
    Mutated { inner: Vec<u8>, mutation: Mutation },
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    None,
    Flip { position: u16, mask: u8 },
    Truncate { len: u16 },
    Extend { extra: Vec<u8> },
    AddHeader,
}

fuzz_target!(|scenario: Scenario| {
    let line = &*LINE;

    match scenario {
        Scenario::Raw { header_field, body } => {
            let mut header = Header::new();
            if let Some((name, value)) = header_field {
                header.set_str(name, value);
            }
            let result = line.receiver.decrypt_packet(&Packet::new(header, body));
            // Forging a 4-byte tag by chance is possible but a 16-byte token is not
            assert_eq!(result, Err(CipherError::InvalidPacket));
        },
        Scenario::Mutated { inner, mutation } => {
            let inner = Packet::with_body(inner);
            let sealed = line.sender.encrypt_packet(&inner).unwrap();
            let mut body = sealed.body.to_vec();
            let mut header = Header::new();

            let modified = match mutation {
                Mutation::None => false,
                Mutation::Flip { position, mask } => {
                    let i = usize::from(position) % body.len();
                    body[i] ^= mask;
                    mask != 0
                },
                Mutation::Truncate { len } => {
                    let len = usize::from(len) % body.len();
                    body.truncate(len);
                    true
                },
                Mutation::Extend { extra } => {
                    body.extend_from_slice(&extra);
                    !extra.is_empty()
                },
                Mutation::AddHeader => {
                    header.set_u32("x", 1);
                    true
                },
            };

            let result = line.receiver.decrypt_packet(&Packet::new(header, body));
            if modified {
                assert_eq!(result, Err(CipherError::InvalidPacket));
            } else {
                assert_eq!(result, Ok(inner));
            }
        },
    }

    let probe = Packet::with_body(&b"probe"[..]);
    let sealed = line.sender.encrypt_packet(&probe).unwrap();
    assert_eq!(line.receiver.decrypt_packet(&sealed), Ok(probe));
});
