//! Randomness source abstraction.
//!
//! Every random draw in this crate (private scalars, message IVs, packet
//! nonces) goes through an [`Entropy`] implementation. Production code uses
//! [`OsEntropy`]; tests can substitute seeded or failing sources.

use crate::error::CipherError;

/// Source of cryptographically secure random bytes.
///
/// # Invariants
///
/// - `fill` either fills the whole buffer or returns an error. It never
///   returns partially filled or default bytes on failure.
/// - Production implementations MUST use a CSPRNG.
pub trait Entropy: Send + Sync {
    /// Fill `buffer` with random bytes.
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CipherError>;
}

/// OS cryptographic RNG (getrandom).
///
/// Failures are reported as [`CipherError::Entropy`] rather than retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CipherError> {
        getrandom::fill(buffer).map_err(|e| CipherError::Entropy { reason: e.to_string() })
    }
}

impl<E: Entropy + ?Sized> Entropy for &E {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CipherError> {
        (**self).fill(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_entropy_fills_buffer() {
        let mut bytes = [0u8; 64];
        OsEntropy.fill(&mut bytes).unwrap();

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "most bytes should be non-zero");
    }

    #[test]
    fn os_entropy_draws_differ() {
        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];
        OsEntropy.fill(&mut bytes1).unwrap();
        OsEntropy.fill(&mut bytes2).unwrap();

        assert_ne!(bytes1, bytes2);
    }
}
