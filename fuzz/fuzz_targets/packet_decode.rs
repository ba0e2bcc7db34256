//! Fuzz target for Packet::decode
//!
//! This fuzzer tests packet framing with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Length prefix over-reads
//! - Headers that decode but do not re-encode
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use linecipher_proto::Packet;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::decode(data) {
        // Anything that decodes must survive a re-encode round trip
        let encoded = packet.encode().unwrap();
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }
});
