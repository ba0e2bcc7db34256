//! Message and handshake envelopes.
//!
//! ```text
//! ┌────────────────────┬────────┬─────────────────────┬─────────┐
//! │ line public key 21 │ IV 4   │ AES-128-CTR payload │ tag 4   │
//! └────────────────────┴────────┴─────────────────────┴─────────┘
//! ```
//!
//! The payload key comes from ECDH between the sender's ephemeral line key and
//! the recipient's identity key. The tag key comes from ECDH between the two
//! identity keys followed by the IV, and covers every byte before the tag.
//!
//! Plain messages are verified before they are decrypted. Handshakes carry
//! the sender's identity inside the ciphertext, so they are decrypted and
//! decoded first and verified against the identity they name.
//!
//! Random IVs are supplied by the caller.

use linecipher_proto::{Header, Packet};
use zeroize::Zeroizing;

use crate::{
    curve::{self, AffinePoint, POINT_SIZE},
    derivation::{self, NONCE_SIZE, TAG_SIZE},
    error::CipherError,
    handshake::Handshake,
    key::KeyPair,
    parts::Parts,
};

/// Size of the random message IV.
pub const IV_SIZE: usize = NONCE_SIZE;

/// Bytes a message envelope adds around its payload.
pub const MESSAGE_OVERHEAD: usize = POINT_SIZE + IV_SIZE + TAG_SIZE;

/// Header field holding the handshake timestamp.
pub const AT_FIELD: &str = "at";

const PAYLOAD_OFFSET: usize = POINT_SIZE + IV_SIZE;

/// Build a message envelope for `remote_identity`.
///
/// `local_line` and `local_identity` must both carry private scalars and
/// `local_line` its public point; `remote_identity` must carry a public point.
pub(crate) fn seal(
    local_line: &KeyPair,
    local_identity: &KeyPair,
    remote_identity: &KeyPair,
    plaintext: &[u8],
    iv: [u8; IV_SIZE],
) -> Result<Vec<u8>, CipherError> {
    let (Some(line_public), Some(line_scalar), Some(identity_scalar), Some(remote)) = (
        local_line.public_bytes(),
        local_line.scalar(),
        local_identity.scalar(),
        remote_identity.point(),
    ) else {
        return Err(CipherError::InvalidState);
    };

    let line_secret = curve::shared_secret(remote, line_scalar).ok_or(CipherError::InvalidKey)?;
    let identity_secret =
        curve::shared_secret(remote, identity_scalar).ok_or(CipherError::InvalidKey)?;
    let key = derivation::message_key(line_secret.as_slice());

    let mut out = Vec::with_capacity(MESSAGE_OVERHEAD + plaintext.len());
    out.extend_from_slice(&line_public);
    out.extend_from_slice(&iv);
    out.extend_from_slice(plaintext);
    derivation::apply_keystream(&key, iv, &mut out[PAYLOAD_OFFSET..]);

    let tag = derivation::tag(&[identity_secret.as_slice(), iv.as_slice()], &out);
    out.extend_from_slice(&tag);

    Ok(out)
}

/// Framed handshake plaintext: `parts` and `at` in the header, the identity
/// public key as the body.
pub(crate) fn handshake_plaintext(
    identity_public: [u8; POINT_SIZE],
    at: u32,
    parts: &Parts,
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    let mut header = Header::new();
    parts.apply_to(&mut header);
    header.set_u32(AT_FIELD, at);

    Ok(Zeroizing::new(Packet::new(header, identity_public.to_vec()).encode()?))
}

/// Verify and decrypt a message sent by `remote` to `local`.
///
/// # Errors
///
/// - `InvalidState` if `local` has no private scalar or `remote` no public
///   point
/// - `InvalidMessage` if the envelope is short, the tag does not verify or
///   the embedded line key is not a curve point
pub fn decrypt_message(
    local: &KeyPair,
    remote: &KeyPair,
    bytes: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    let (Some(scalar), Some(remote)) = (local.scalar(), remote.point()) else {
        return Err(CipherError::InvalidState);
    };

    let envelope = Envelope::parse(bytes)?;
    envelope.verify(scalar, remote)?;

    let line = envelope.line_point()?;
    envelope.decrypt(&line, scalar)
}

/// Decrypt, decode and authenticate a handshake addressed to `local`.
///
/// # Errors
///
/// - `InvalidState` if `local` has no private scalar
/// - `InvalidMessage` on any envelope, framing or authentication failure
pub fn decrypt_handshake(local: &KeyPair, bytes: &[u8]) -> Result<Handshake, CipherError> {
    let Some(scalar) = local.scalar() else {
        return Err(CipherError::InvalidState);
    };

    let envelope = Envelope::parse(bytes)?;
    let line = envelope.line_point()?;
    let plaintext = envelope.decrypt(&line, scalar)?;

    let packet = Packet::decode(&plaintext).map_err(|_| CipherError::InvalidMessage)?;
    let at = packet.header.get_u32(AT_FIELD).ok_or(CipherError::InvalidMessage)?;
    if packet.body.len() != POINT_SIZE {
        return Err(CipherError::InvalidMessage);
    }
    let identity = AffinePoint::decode(&packet.body).ok_or(CipherError::InvalidMessage)?;

    envelope.verify(scalar, &identity)?;

    let parts = Parts::from_header(&packet.header)?;

    Ok(Handshake::new(KeyPair::from_point(identity), KeyPair::from_point(line), at, parts))
}

/// Borrowed view of a message envelope.
struct Envelope<'a> {
    line_public: &'a [u8; POINT_SIZE],
    iv: &'a [u8; IV_SIZE],
    ciphertext: &'a [u8],
    /// Everything the tag covers
    signed: &'a [u8],
    tag: &'a [u8; TAG_SIZE],
}

impl<'a> Envelope<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, CipherError> {
        if bytes.len() < MESSAGE_OVERHEAD {
            return Err(CipherError::InvalidMessage);
        }

        let Some((signed, tag)) = bytes.split_last_chunk::<TAG_SIZE>() else {
            return Err(CipherError::InvalidMessage);
        };
        let Some((line_public, rest)) = signed.split_first_chunk::<POINT_SIZE>() else {
            return Err(CipherError::InvalidMessage);
        };
        let Some((iv, ciphertext)) = rest.split_first_chunk::<IV_SIZE>() else {
            return Err(CipherError::InvalidMessage);
        };

        Ok(Self { line_public, iv, ciphertext, signed, tag })
    }

    fn line_point(&self) -> Result<AffinePoint, CipherError> {
        AffinePoint::decode(self.line_public).ok_or(CipherError::InvalidMessage)
    }

    fn verify(&self, scalar: &[u8], sender_identity: &AffinePoint) -> Result<(), CipherError> {
        let secret =
            curve::shared_secret(sender_identity, scalar).ok_or(CipherError::InvalidMessage)?;
        let expected = derivation::tag(&[secret.as_slice(), self.iv.as_slice()], self.signed);

        if !derivation::tags_match(self.tag, expected) {
            return Err(CipherError::InvalidMessage);
        }
        Ok(())
    }

    fn decrypt(
        &self,
        line: &AffinePoint,
        scalar: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let secret = curve::shared_secret(line, scalar).ok_or(CipherError::InvalidMessage)?;
        let key = derivation::message_key(secret.as_slice());

        let mut plaintext = Zeroizing::new(self.ciphertext.to_vec());
        derivation::apply_keystream(&key, *self.iv, &mut plaintext);
        Ok(plaintext)
    }
}
