//! Key derivation and the symmetric primitives built on it.
//!
//! Everything here is deterministic. Inputs are shared secrets and public
//! encodings; outputs are 16-byte AES keys, 16-byte tokens and 4-byte tags.

use aes::Aes128;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::curve::POINT_SIZE;

type HmacSha256 = Hmac<Sha256>;
type Aes128Ctr = Ctr128BE<Aes128>;

/// Size of an AES-128 key.
pub const KEY_SIZE: usize = 16;

/// Size of an IV or packet nonce on the wire.
pub const NONCE_SIZE: usize = 4;

/// Size of a folded authentication tag.
pub const TAG_SIZE: usize = 4;

/// Size of a token.
pub const TOKEN_SIZE: usize = 16;

/// A 16-byte AES-128 key. Zeroized on drop.
#[derive(Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Reduce a SHA-256 digest by repeatedly XORing its upper half into its lower
/// half until `N` bytes remain.
///
/// Only the 32→16 and 32→4 reductions exist; any other width fails to compile.
pub(crate) fn fold<const N: usize>(digest: &[u8; 32]) -> [u8; N] {
    const { assert!(N == 16 || N == 4, "fold is defined for 16 and 4 byte outputs only") };

    let mut buf = *digest;
    let mut len = buf.len();
    while len > N {
        let half = len / 2;
        for i in 0..half {
            buf[i] ^= buf[half + i];
        }
        len = half;
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    buf.zeroize();
    out
}

/// Token for a line key: SHA-256 of the first 16 bytes of its public
/// encoding, truncated to 16 bytes.
pub(crate) fn token_digest(line_public: &[u8; POINT_SIZE]) -> [u8; TOKEN_SIZE] {
    let digest = Sha256::digest(&line_public[..TOKEN_SIZE]);
    let mut token = [0u8; TOKEN_SIZE];
    token.copy_from_slice(&digest[..TOKEN_SIZE]);
    token
}

/// Directional line keys from the line-level shared secret.
///
/// Returns `(encryption, decryption)`. The encryption key hashes the local
/// line key before the remote one; the decryption key hashes them in the
/// opposite order, so one side's encryption key is the other's decryption
/// key.
pub(crate) fn line_keys(
    shared: &[u8],
    local_line: &[u8; POINT_SIZE],
    remote_line: &[u8; POINT_SIZE],
) -> (SymmetricKey, SymmetricKey) {
    let encryption = directional_key(shared, local_line, remote_line);
    let decryption = directional_key(shared, remote_line, local_line);
    (encryption, decryption)
}

fn directional_key(shared: &[u8], first: &[u8], second: &[u8]) -> SymmetricKey {
    let mut sha = Sha256::new();
    sha.update(shared);
    sha.update(first);
    sha.update(second);
    let digest: Zeroizing<[u8; 32]> = Zeroizing::new(sha.finalize().into());
    SymmetricKey(fold(&digest))
}

/// Confidentiality key for a message: fold16(SHA-256(shared)).
pub(crate) fn message_key(shared: &[u8]) -> SymmetricKey {
    let digest: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(shared).into());
    SymmetricKey(fold(&digest))
}

/// Folded HMAC-SHA256 tag. The HMAC key is the concatenation of `key_parts`.
pub(crate) fn tag(key_parts: &[&[u8]], data: &[u8]) -> [u8; TAG_SIZE] {
    let key = Zeroizing::new(key_parts.concat());

    let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(data);
    let sum: Zeroizing<[u8; 32]> = Zeroizing::new(mac.finalize().into_bytes().into());

    fold(&sum)
}

/// Constant-time tag comparison.
pub(crate) fn tags_match(received: &[u8], expected: [u8; TAG_SIZE]) -> bool {
    received.ct_eq(&expected).into()
}

/// AES-128-CTR in place. The 4-byte nonce is zero-extended to the 16-byte
/// initial counter block.
pub(crate) fn apply_keystream(key: &SymmetricKey, nonce: [u8; NONCE_SIZE], buf: &mut [u8]) {
    let mut iv = [0u8; 16];
    iv[..NONCE_SIZE].copy_from_slice(&nonce);

    let Ok(mut cipher) = Aes128Ctr::new_from_slices(key.as_bytes(), &iv) else {
        unreachable!("AES-128-CTR takes a 16-byte key and a 16-byte IV");
    };
    cipher.apply_keystream(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(byte: u8) -> [u8; 32] {
        let mut digest = [0u8; 32];
        for (i, b) in digest.iter_mut().enumerate() {
            *b = byte.wrapping_add(i as u8);
        }
        digest
    }

    #[test]
    fn fold_to_16_xors_halves() {
        let digest = digest_of(0);
        let folded: [u8; 16] = fold(&digest);

        for i in 0..16 {
            assert_eq!(folded[i], digest[i] ^ digest[i + 16]);
        }
    }

    #[test]
    fn fold_to_4_xors_all_eight_words() {
        let digest = digest_of(0x5a);
        let folded: [u8; 4] = fold(&digest);

        for i in 0..4 {
            let expected = (0..8).fold(0u8, |acc, word| acc ^ digest[word * 4 + i]);
            assert_eq!(folded[i], expected);
        }
    }

    #[test]
    fn token_is_truncated_sha256_of_prefix() {
        let mut public = [0u8; POINT_SIZE];
        public[0] = 0x02;
        public[20] = 0xff;

        let token = token_digest(&public);
        let digest = Sha256::digest(&public[..16]);
        assert_eq!(&token[..], &digest[..16]);

        // Bytes past the first 16 do not influence the token
        public[20] = 0x00;
        assert_eq!(token_digest(&public), token);
    }

    #[test]
    fn line_keys_are_directional() {
        let shared = [7u8; 20];
        let a = [0x02; POINT_SIZE];
        let b = [0x03; POINT_SIZE];

        let (a_enc, a_dec) = line_keys(&shared, &a, &b);
        let (b_enc, b_dec) = line_keys(&shared, &b, &a);

        assert!(a_enc == b_dec, "A's encryption key must be B's decryption key");
        assert!(a_dec == b_enc, "A's decryption key must be B's encryption key");
        assert!(a_enc != a_dec, "directions must differ");
    }

    #[test]
    fn tag_depends_on_every_key_part() {
        let data = b"nonce and ciphertext";
        let base = tag(&[b"line key........", b"\x00\x00\x00\x01"], data);

        assert_ne!(base, tag(&[b"line key........", b"\x00\x00\x00\x02"], data));
        assert_ne!(base, tag(&[b"line key.......!", b"\x00\x00\x00\x01"], data));
        assert_ne!(base, tag(&[b"line key........", b"\x00\x00\x00\x01"], b"other data"));
    }

    #[test]
    fn tags_match_requires_exact_bytes() {
        let expected = [1, 2, 3, 4];
        assert!(tags_match(&[1, 2, 3, 4], expected));
        assert!(!tags_match(&[1, 2, 3, 5], expected));
        assert!(!tags_match(&[1, 2, 3], expected));
    }

    #[test]
    fn keystream_roundtrip_and_nonce_sensitivity() {
        let key = message_key(b"shared secret");
        let plaintext = b"line packet contents".to_vec();

        let mut buf = plaintext.clone();
        apply_keystream(&key, [0, 0, 0, 1], &mut buf);
        assert_ne!(buf, plaintext);

        let mut other = plaintext.clone();
        apply_keystream(&key, [0, 0, 0, 2], &mut other);
        assert_ne!(buf, other);

        apply_keystream(&key, [0, 0, 0, 1], &mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn keystream_matches_aes_block_zero_extended_iv() {
        // With an all-zero plaintext the first block of output is
        // AES(key, nonce || 0^12).
        use aes::cipher::{BlockEncrypt, KeyInit};

        let key = message_key(b"k");
        let nonce = [0xde, 0xad, 0xbe, 0xef];

        let mut stream = [0u8; 16];
        apply_keystream(&key, nonce, &mut stream);

        let block_cipher = Aes128::new_from_slice(key.as_bytes()).unwrap();
        let mut block = aes::Block::default();
        block[..4].copy_from_slice(&nonce);
        block_cipher.encrypt_block(&mut block);

        assert_eq!(&stream[..], &block[..]);
    }
}
