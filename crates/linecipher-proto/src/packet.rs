//! Packet type combining header and body.
//!
//! Layout on the wire:
//! `[header length: u16 BE] + [header: JSON object, omitted when empty] +
//! [body: remaining bytes]`
//!
//! This is a pure data holder. Encrypted envelopes put ciphertext in the body
//! and leave the header empty; handshakes carry routing fields in the header.

use bytes::{BufMut, Bytes};

use crate::{
    Header,
    errors::{ProtocolError, Result},
};

/// Size of the header length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// A framed packet.
///
/// # Invariants
///
/// - Decoding consumes the whole input: everything after the header is body.
/// - An empty header is encoded as a zero length prefix, never as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Named header fields
    pub header: Header,

    /// Raw body bytes
    pub body: Bytes,
}

impl Packet {
    /// Create a packet from a header and body.
    #[must_use]
    pub fn new(header: Header, body: impl Into<Bytes>) -> Self {
        Self { header, body: body.into() }
    }

    /// Create a packet with an empty header.
    #[must_use]
    pub fn with_body(body: impl Into<Bytes>) -> Self {
        Self::new(Header::new(), body)
    }

    /// Body length in bytes.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::HeaderTooLarge` if the header does not fit the u16
    ///   length prefix
    pub fn encode_into(&self, dst: &mut impl BufMut) -> Result<()> {
        let header = self.header.to_bytes()?;
        self.put_framed(&header, dst)
    }

    /// Encode into a fresh buffer sized for the whole packet.
    ///
    /// # Errors
    ///
    /// See [`Packet::encode_into`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header.to_bytes()?;
        let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + header.len() + self.body.len());
        self.put_framed(&header, &mut out)?;
        Ok(out)
    }

    fn put_framed(&self, header: &[u8], dst: &mut impl BufMut) -> Result<()> {
        let Ok(header_len) = u16::try_from(header.len()) else {
            return Err(ProtocolError::HeaderTooLarge {
                size: header.len(),
                max: Header::MAX_SIZE,
            });
        };

        dst.put_u16(header_len);
        dst.put_slice(header);
        dst.put_slice(&self.body);

        Ok(())
    }

    /// Decode a packet from wire bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooShort` if the length prefix or announced
    ///   header is truncated
    /// - `ProtocolError::InvalidHeader` if the header is not a JSON object
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some((prefix, rest)) = bytes.split_first_chunk::<LENGTH_PREFIX_SIZE>() else {
            return Err(ProtocolError::PacketTooShort {
                expected: LENGTH_PREFIX_SIZE,
                actual: bytes.len(),
            });
        };

        let header_len = usize::from(u16::from_be_bytes(*prefix));
        if rest.len() < header_len {
            return Err(ProtocolError::PacketTooShort {
                expected: LENGTH_PREFIX_SIZE + header_len,
                actual: bytes.len(),
            });
        }

        let (header, body) = rest.split_at(header_len);
        let header = Header::from_bytes(header)?;

        Ok(Self { header, body: Bytes::copy_from_slice(body) })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn empty_packet_is_two_zero_bytes() {
        let wire = Packet::default().encode().unwrap();
        assert_eq!(wire, hex!("0000"));

        let parsed = Packet::decode(&wire).unwrap();
        assert!(parsed.header.is_empty());
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn body_only_packet_layout() {
        let packet = Packet::with_body(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(packet.encode().unwrap(), hex!("0000deadbeef"));
    }

    #[test]
    fn header_and_body_layout() {
        let mut header = Header::new();
        header.set_u32("at", 5);
        let packet = Packet::new(header, vec![0x01]);

        let wire = packet.encode().unwrap();
        // {"at":5} is 8 bytes
        assert_eq!(&wire[..2], &[0x00, 0x08]);
        assert_eq!(&wire[2..10], br#"{"at":5}"#);
        assert_eq!(&wire[10..], &[0x01]);

        assert_eq!(Packet::decode(&wire).unwrap(), packet);
    }

    #[test]
    fn encode_allocates_exactly_once() {
        let mut header = Header::new();
        header.set_str("1a", "f".repeat(200));
        let packet = Packet::new(header, vec![0x42; 48]);

        let wire = packet.encode().unwrap();
        assert_eq!(wire.len(), LENGTH_PREFIX_SIZE + 209 + 48);
        assert_eq!(wire.capacity(), wire.len());

        let mut streamed = Vec::new();
        packet.encode_into(&mut streamed).unwrap();
        assert_eq!(streamed, wire);
    }

    #[test]
    fn reject_missing_length_prefix() {
        assert!(matches!(
            Packet::decode(&[0x00]),
            Err(ProtocolError::PacketTooShort { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn reject_truncated_header() {
        let result = Packet::decode(&hex!("0010 7b7d"));
        assert!(matches!(result, Err(ProtocolError::PacketTooShort { expected: 18, actual: 4 })));
    }

    #[test]
    fn reject_garbage_header() {
        let result = Packet::decode(&hex!("0002 ffff"));
        assert!(matches!(result, Err(ProtocolError::InvalidHeader(_))));
    }
}
