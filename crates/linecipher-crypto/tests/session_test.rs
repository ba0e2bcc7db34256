//! Session lifecycle tests: handshakes, line packets, rotation and failures.
//!
//! # Oracle Pattern
//!
//! Each scenario ends by checking that:
//! - Both peers agree on tokens and can exchange packets in both directions
//! - Rejected input leaves the session usable and unchanged

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use linecipher_crypto::{
    CipherError, CipherState, Entropy, KeyPair, PACKET_OVERHEAD, Parts, Token, decrypt_handshake,
};
use linecipher_proto::{Header, Packet};
use sha2::{Digest, Sha256};

/// Deterministic entropy: SHA-256 over (seed, counter).
struct SeededEntropy {
    seed: u64,
    counter: AtomicU64,
}

impl SeededEntropy {
    fn new(seed: u64) -> Self {
        Self { seed, counter: AtomicU64::new(0) }
    }
}

impl Entropy for SeededEntropy {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CipherError> {
        for chunk in buffer.chunks_mut(32) {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let block = Sha256::new()
                .chain_update(self.seed.to_be_bytes())
                .chain_update(n.to_be_bytes())
                .finalize();
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        Ok(())
    }
}

/// Entropy that works until disarmed.
struct Switchable {
    inner: SeededEntropy,
    failing: AtomicBool,
}

impl Entropy for Switchable {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CipherError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(CipherError::Entropy { reason: "source exhausted".to_string() });
        }
        self.inner.fill(buffer)
    }
}

struct Peer {
    identity: KeyPair,
    state: CipherState<SeededEntropy>,
}

impl Peer {
    fn new(seed: u64) -> Self {
        let identity = KeyPair::generate_with(&SeededEntropy::new(seed ^ 0xdead_beef)).unwrap();
        let state = CipherState::with_entropy(&identity, SeededEntropy::new(seed)).unwrap();
        Self { identity, state }
    }

    /// New session for the same identity, with a fresh line key.
    fn reconnect(&self, seed: u64) -> Self {
        let state = CipherState::with_entropy(&self.identity, SeededEntropy::new(seed)).unwrap();
        Self { identity: self.identity.clone(), state }
    }

    /// Send a handshake to `to`, which applies it.
    fn handshake_to(&self, to: &Peer) -> bool {
        self.state.bind_remote_identity(&to.identity.public_only()).unwrap();
        let bytes = self.state.encrypt_handshake(42, &Parts::new()).unwrap();
        let handshake = decrypt_handshake(&to.identity, &bytes).unwrap();
        to.state.apply_handshake(&handshake)
    }
}

fn established(seed: u64) -> (Peer, Peer) {
    let a = Peer::new(seed);
    let b = Peer::new(seed + 1000);
    assert!(a.handshake_to(&b));
    assert!(b.handshake_to(&a));
    (a, b)
}

fn inner_packet(text: &str) -> Packet {
    let mut header = Header::new();
    header.set_str("type", "chat");
    header.set_u32("seq", 7);
    Packet::new(header, text.as_bytes().to_vec())
}

fn assert_line_works(from: &Peer, to: &Peer) {
    let inner = inner_packet("ping");
    let sealed = from.state.encrypt_packet(&inner).unwrap();
    assert_eq!(to.state.decrypt_packet(&sealed).unwrap(), inner);
}

#[test]
fn packets_roundtrip_both_directions() {
    let (a, b) = established(1);

    assert_line_works(&a, &b);
    assert_line_works(&b, &a);
}

#[test]
fn packet_envelope_layout() {
    let (a, b) = established(2);
    let inner = inner_packet("layout");
    let sealed = a.state.encrypt_packet(&inner).unwrap();

    assert!(sealed.header.is_empty());
    assert_eq!(sealed.body.len(), PACKET_OVERHEAD + inner.encode().unwrap().len());
    assert_eq!(Token::from_payload(&sealed.body), Some(b.state.local_token()));
}

#[test]
fn tokens_agree_after_mutual_handshake() {
    let (a, b) = established(3);

    assert_eq!(a.state.remote_token(), Some(b.state.local_token()));
    assert_eq!(b.state.remote_token(), Some(a.state.local_token()));
    assert_ne!(a.state.local_token(), b.state.local_token());
}

#[test]
fn one_handshake_is_enough_to_receive_identity() {
    let a = Peer::new(4);
    let b = Peer::new(5);
    assert!(a.handshake_to(&b));

    // B adopted A's identity from the handshake
    assert!(b.state.remote_identity().unwrap().same_public(&a.identity));
    assert!(b.state.can_encrypt_packet());
    assert!(!a.state.can_encrypt_packet());
}

#[test]
fn handshake_carries_timestamp_parts_and_identity() {
    let a = Peer::new(6);
    let b = Peer::new(7);
    a.state.bind_remote_identity(&b.identity).unwrap();

    let mut parts = Parts::new();
    parts.insert(0x1a, a.identity.to_string());
    parts.insert(0x3a, "other-suite");
    let bytes = a.state.encrypt_handshake(1_700_000_000, &parts).unwrap();

    let handshake = decrypt_handshake(&b.identity, &bytes).unwrap();
    assert_eq!(handshake.at(), 1_700_000_000);
    assert_eq!(handshake.parts(), &parts);
    assert_eq!(handshake.csid(), 0x1a);
    assert!(handshake.identity().same_public(&a.identity));
    assert!(b.state.can_decrypt_handshake());
}

#[test]
fn every_flipped_packet_byte_is_rejected() {
    let (a, b) = established(8);
    let sealed = a.state.encrypt_packet(&inner_packet("tamper")).unwrap();

    for i in 0..sealed.body.len() {
        let mut body = sealed.body.to_vec();
        body[i] ^= 0x80;
        let tampered = Packet::with_body(body);

        assert_eq!(
            b.state.decrypt_packet(&tampered),
            Err(CipherError::InvalidPacket),
            "flip at offset {i} must be rejected"
        );
    }

    // Still usable afterwards
    assert_line_works(&a, &b);
}

#[test]
fn every_flipped_handshake_bit_is_rejected() {
    let a = Peer::new(30);
    let b = Peer::new(31);
    a.state.bind_remote_identity(&b.identity.public_only()).unwrap();

    let parts: Parts = [(0x1a, "fp".to_string())].into_iter().collect();
    let sealed = a.state.encrypt_handshake(u32::MAX, &parts).unwrap();
    assert!(decrypt_handshake(&b.identity, &sealed).is_ok());

    // Covers the line key, IV, ciphertext and tag
    for i in 0..sealed.len() {
        for bit in 0..8 {
            let mut tampered = sealed.clone();
            tampered[i] ^= 1 << bit;

            assert_eq!(
                decrypt_handshake(&b.identity, &tampered).err(),
                Some(CipherError::InvalidMessage),
                "flip of bit {bit} at offset {i} must be rejected"
            );
        }
    }
}

#[test]
fn malformed_envelopes_are_rejected() {
    let (a, b) = established(9);
    let sealed = a.state.encrypt_packet(&inner_packet("x")).unwrap();

    let mut with_header = sealed.clone();
    with_header.header.set_u32("c", 1);
    assert_eq!(b.state.decrypt_packet(&with_header), Err(CipherError::InvalidPacket));

    let short = Packet::with_body(sealed.body.slice(..PACKET_OVERHEAD - 1));
    assert_eq!(b.state.decrypt_packet(&short), Err(CipherError::InvalidPacket));

    assert_eq!(b.state.decrypt_packet(&Packet::default()), Err(CipherError::InvalidPacket));
}

#[test]
fn packet_for_another_session_is_rejected() {
    let (a, _b) = established(10);
    let (_c, d) = established(20);

    let sealed = a.state.encrypt_packet(&inner_packet("misrouted")).unwrap();
    assert_eq!(d.state.decrypt_packet(&sealed), Err(CipherError::InvalidPacket));
}

#[test]
fn own_packets_do_not_decrypt_locally() {
    let (a, _b) = established(11);
    let sealed = a.state.encrypt_packet(&inner_packet("echo")).unwrap();

    // Addressed to the remote token, not ours
    assert_eq!(a.state.decrypt_packet(&sealed), Err(CipherError::InvalidPacket));
}

#[test]
fn rotation_rederives_line() {
    let (a, b) = established(12);
    let old_remote_token = a.state.remote_token();
    let stale = b.state.encrypt_packet(&inner_packet("before")).unwrap();

    // B restarts with a fresh line key
    let b2 = b.reconnect(13);
    assert!(b2.handshake_to(&a));

    assert_ne!(a.state.remote_token(), old_remote_token);
    assert_eq!(a.state.remote_token(), Some(b2.state.local_token()));

    // Packets from the old line no longer authenticate
    assert_eq!(a.state.decrypt_packet(&stale), Err(CipherError::InvalidPacket));

    assert!(a.handshake_to(&b2));
    assert_line_works(&a, &b2);
    assert_line_works(&b2, &a);
}

#[test]
fn repeated_handshake_is_idempotent() {
    let (a, b) = established(14);
    let token = b.state.remote_token();

    assert!(a.handshake_to(&b));
    assert_eq!(b.state.remote_token(), token);
    assert_line_works(&a, &b);
}

#[test]
fn foreign_identity_handshake_is_rejected_without_change() {
    let (a, b) = established(15);
    let mallory = Peer::new(16);
    let token = a.state.remote_token();

    assert!(!mallory.handshake_to(&a));

    assert_eq!(a.state.remote_token(), token);
    assert!(a.state.remote_identity().unwrap().same_public(&b.identity));
    assert_line_works(&b, &a);
}

#[test]
fn binding_a_different_identity_fails() {
    let a = Peer::new(17);
    let b = Peer::new(18);
    let c = Peer::new(19);

    a.state.bind_remote_identity(&b.identity).unwrap();
    a.state.bind_remote_identity(&b.identity.public_only()).unwrap();
    assert_eq!(a.state.bind_remote_identity(&c.identity), Err(CipherError::InvalidState));
    assert_eq!(
        a.state.bind_remote_identity(&KeyPair::default()),
        Err(CipherError::InvalidKey)
    );
}

#[test]
fn operations_before_their_phase_are_invalid_state() {
    let a = Peer::new(21);
    let b = Peer::new(22);

    assert_eq!(a.state.encrypt_message(b"early").err(), Some(CipherError::InvalidState));
    assert_eq!(a.state.decrypt_message(&[0u8; 64]).err(), Some(CipherError::InvalidState));
    assert_eq!(
        a.state.encrypt_handshake(0, &Parts::new()).err(),
        Some(CipherError::InvalidState)
    );

    a.state.bind_remote_identity(&b.identity).unwrap();
    assert_eq!(a.state.encrypt_packet(&inner_packet("early")), Err(CipherError::InvalidState));
    assert_eq!(a.state.decrypt_packet(&Packet::default()), Err(CipherError::InvalidState));
}

#[test]
fn messages_roundtrip_between_bound_states() {
    let a = Peer::new(23);
    let b = Peer::new(24);
    a.state.bind_remote_identity(&b.identity).unwrap();
    b.state.bind_remote_identity(&a.identity).unwrap();

    let sealed = a.state.encrypt_message(b"direct message").unwrap();
    assert_eq!(b.state.decrypt_message(&sealed).unwrap().as_slice(), b"direct message");

    let mut tampered = sealed;
    tampered[25] ^= 1;
    assert_eq!(b.state.decrypt_message(&tampered).err(), Some(CipherError::InvalidMessage));
}

#[test]
fn is_high_is_antisymmetric() {
    for seed in 30..34 {
        let (a, b) = established(seed);
        assert_ne!(a.state.is_high(), b.state.is_high());
    }

    let lonely = Peer::new(40);
    assert!(!lonely.state.is_high());
}

#[test]
fn session_requires_complete_identity() {
    let key = KeyPair::generate().unwrap();

    assert_eq!(CipherState::new(&key.public_only()).err(), Some(CipherError::InvalidKey));
    assert_eq!(CipherState::new(&KeyPair::default()).err(), Some(CipherError::InvalidKey));
}

#[test]
fn entropy_failure_propagates() {
    let key = KeyPair::generate().unwrap();
    let remote = KeyPair::generate().unwrap();

    let failing = Switchable { inner: SeededEntropy::new(50), failing: AtomicBool::new(true) };
    assert!(matches!(
        CipherState::with_entropy(&key, failing),
        Err(CipherError::Entropy { .. })
    ));

    let flaky = Switchable { inner: SeededEntropy::new(51), failing: AtomicBool::new(false) };
    let state = CipherState::with_entropy(&key, &flaky).unwrap();
    state.bind_remote_identity(&remote).unwrap();
    flaky.failing.store(true, Ordering::Relaxed);

    let err = state.encrypt_message(b"no iv").unwrap_err();
    assert!(matches!(err, CipherError::Entropy { .. }));
    assert!(!err.is_rejected_input());
}

#[test]
fn seeded_sessions_are_reproducible() {
    let a1 = Peer::new(60);
    let a2 = Peer::new(60);

    assert_eq!(a1.state.local_token(), a2.state.local_token());
}
