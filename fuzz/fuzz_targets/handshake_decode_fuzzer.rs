//! Fuzz target for handshake and message decryption
//!
//! Arbitrary bytes go to `decrypt_handshake` and `decrypt_message`. A small
//! share of inputs is steered to start with a valid line key so the fuzzer
//! reaches the decrypt and decode paths behind the curve point check.
//!
//! The fuzzer should NEVER panic. All inputs should return `InvalidMessage`.

#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use linecipher_crypto::{CipherError, KeyPair, POINT_SIZE, decrypt_handshake, decrypt_message};

struct Keys {
    local: KeyPair,
    remote: KeyPair,
    line_public: [u8; POINT_SIZE],
}

static KEYS: LazyLock<Keys> = LazyLock::new(|| {
    let line = KeyPair::generate().unwrap();
    Keys {
        local: KeyPair::generate().unwrap(),
        remote: KeyPair::generate().unwrap().public_only(),
        line_public: line.public_bytes().unwrap(),
    }
});

fuzz_target!(|data: &[u8]| {
    let keys = &*KEYS;

    let input = match data.split_first() {
        Some((selector, rest)) if selector & 0x0f == 0 => [&keys.line_public[..], rest].concat(),
        _ => data.to_vec(),
    };

    assert_eq!(decrypt_handshake(&keys.local, &input).err(), Some(CipherError::InvalidMessage));
    assert_eq!(
        decrypt_message(&keys.local, &keys.remote, &input).err(),
        Some(CipherError::InvalidMessage)
    );
});
