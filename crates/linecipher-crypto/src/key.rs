//! Key material for cipher set 1a.
//!
//! A [`KeyPair`] holds an optional secp160r1 public point and an optional
//! private scalar. Remote keys usually carry only the public half; local
//! identity and line keys carry both.

use std::fmt;

use base32::Alphabet;
use zeroize::Zeroizing;

use crate::{
    CSID,
    curve::{self, AffinePoint, POINT_SIZE},
    entropy::{Entropy, OsEntropy},
    error::CipherError,
};

const DISPLAY_ALPHABET: Alphabet = Alphabet::Rfc4648Lower { padding: false };

/// secp160r1 key material with either half optional.
///
/// # Invariants
///
/// - A present public point is always a valid curve point.
/// - The private scalar is zeroized when the key is dropped.
#[derive(Clone, Default)]
pub struct KeyPair {
    public: Option<AffinePoint>,
    private: Option<Zeroizing<Vec<u8>>>,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Result<Self, CipherError> {
        Self::generate_with(&OsEntropy)
    }

    /// Generate a fresh key pair from `entropy`.
    pub fn generate_with(entropy: &impl Entropy) -> Result<Self, CipherError> {
        let (scalar, public) = curve::generate(entropy)?;
        Ok(Self { public: Some(public), private: Some(scalar) })
    }

    /// Build key material from raw encodings.
    ///
    /// An empty slice leaves that half absent. A non-empty `public` must be a
    /// 21-byte compressed curve point. `private` is copied verbatim.
    ///
    /// # Errors
    ///
    /// `InvalidKey` if `public` is non-empty and does not decode.
    pub fn from_bytes(public: &[u8], private: &[u8]) -> Result<Self, CipherError> {
        let public = if public.is_empty() {
            None
        } else {
            Some(AffinePoint::decode(public).ok_or(CipherError::InvalidKey)?)
        };
        let private = (!private.is_empty()).then(|| Zeroizing::new(private.to_vec()));

        Ok(Self { public, private })
    }

    /// Cipher suite this key belongs to.
    pub fn csid(&self) -> u8 {
        CSID
    }

    /// Compressed public encoding, if present.
    pub fn public_bytes(&self) -> Option<[u8; POINT_SIZE]> {
        self.public.as_ref().map(AffinePoint::encode)
    }

    /// Copy of the private scalar, if present.
    pub fn private_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.private.clone()
    }

    /// True if the private half is present.
    pub fn can_sign(&self) -> bool {
        self.private.is_some()
    }

    /// True if the public half is present.
    pub fn can_encrypt_to(&self) -> bool {
        self.public.is_some()
    }

    /// Copy of this key without the private half.
    #[must_use]
    pub fn public_only(&self) -> Self {
        Self { public: self.public.clone(), private: None }
    }

    /// True if both keys carry the same public point. Keys without a public
    /// point never match.
    pub fn same_public(&self, other: &Self) -> bool {
        match (&self.public, &other.public) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn from_point(point: AffinePoint) -> Self {
        Self { public: Some(point), private: None }
    }

    pub(crate) fn point(&self) -> Option<&AffinePoint> {
        self.public.as_ref()
    }

    pub(crate) fn scalar(&self) -> Option<&[u8]> {
        self.private.as_deref().map(Vec::as_slice)
    }
}

/// Lowercase unpadded base32 of the public encoding. Empty without one.
impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.public_bytes() {
            Some(bytes) => f.write_str(&base32::encode(DISPLAY_ALPHABET, &bytes)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.to_string())
            .field("private", &self.private.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}
