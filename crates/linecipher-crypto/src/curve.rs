//! secp160r1 point codec and Diffie-Hellman.
//!
//! Points travel as 21-byte SEC1 compressed encodings (parity prefix + 20-byte
//! x). Scalar multiplication runs in Jacobian coordinates with a single
//! inversion at the end. Arithmetic is on `num-bigint` and is NOT constant
//! time; intermediate big integers are not zeroized.

use std::sync::LazyLock;

use hex_literal::hex;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use zeroize::Zeroizing;

use crate::{entropy::Entropy, error::CipherError};

/// Size of a compressed point encoding.
pub const POINT_SIZE: usize = 21;

/// Size of a field element (and of an ECDH shared secret).
pub const FIELD_SIZE: usize = 20;

/// Size of a freshly generated private scalar.
pub const SCALAR_SIZE: usize = 21;

/// Upper bound on rejection-sampling rounds when drawing a scalar.
const MAX_SCALAR_ATTEMPTS: usize = 64;

const P: [u8; FIELD_SIZE] = hex!("ffffffffffffffffffffffffffffffff7fffffff");
const A: [u8; FIELD_SIZE] = hex!("ffffffffffffffffffffffffffffffff7ffffffc");
const B: [u8; FIELD_SIZE] = hex!("1c97befc54bd7a8b65acf89f81d4d4adc565fa45");
const GX: [u8; FIELD_SIZE] = hex!("4a96b5688ef573284664698968c38bb913cbfc82");
const GY: [u8; FIELD_SIZE] = hex!("23a628553168947d59dcc912042351377ac5fb32");
const N: [u8; SCALAR_SIZE] = hex!("0100000000000000000001f4c8f927aed3ca752257");

static SECP160R1: LazyLock<Curve> = LazyLock::new(Curve::secp160r1);

/// A point on secp160r1 in affine coordinates. Never the point at infinity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AffinePoint {
    x: BigUint,
    y: BigUint,
}

impl AffinePoint {
    /// Decode a compressed point. `None` unless `bytes` is exactly
    /// [`POINT_SIZE`] bytes naming a point on the curve.
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        SECP160R1.decompress(bytes)
    }

    /// Compressed encoding.
    pub(crate) fn encode(&self) -> [u8; POINT_SIZE] {
        let mut out = [0u8; POINT_SIZE];
        out[0] = if self.y.bit(0) { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&to_fixed::<FIELD_SIZE>(&self.x));
        out
    }

    /// The x-coordinate as an integer.
    pub(crate) fn x(&self) -> &BigUint {
        &self.x
    }
}

/// ECDH: x-coordinate of `scalar · point`, left-padded to [`FIELD_SIZE`].
///
/// `None` if the scalar is a multiple of the group order.
pub(crate) fn shared_secret(
    point: &AffinePoint,
    scalar: &[u8],
) -> Option<Zeroizing<[u8; FIELD_SIZE]>> {
    let k = BigUint::from_bytes_be(scalar);
    let product = SECP160R1.mul(&k, point)?;
    Some(Zeroizing::new(to_fixed::<FIELD_SIZE>(&product.x)))
}

/// Draw a private scalar in `[1, n)` and derive its public point.
pub(crate) fn generate(
    entropy: &impl Entropy,
) -> Result<(Zeroizing<Vec<u8>>, AffinePoint), CipherError> {
    let curve = &*SECP160R1;

    for _ in 0..MAX_SCALAR_ATTEMPTS {
        let mut scalar = Zeroizing::new(vec![0u8; SCALAR_SIZE]);
        entropy.fill(&mut scalar)?;
        // n is 161 bits wide
        scalar[0] &= 0x01;

        let k = BigUint::from_bytes_be(&scalar);
        if k.is_zero() || k >= curve.n {
            continue;
        }

        if let Some(public) = curve.mul(&k, &curve.g) {
            return Ok((scalar, public));
        }
    }

    Err(CipherError::Entropy { reason: "no valid scalar after repeated draws".to_string() })
}

/// Left-pad a big-endian integer to `N` bytes. Values wider than `N` keep
/// their low-order bytes.
fn to_fixed<const N: usize>(value: &BigUint) -> [u8; N] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; N];
    let take = bytes.len().min(N);
    out[N - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}

/// Jacobian point `(X / Z², Y / Z³)`; `Z = 0` is the point at infinity.
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Self { x: BigUint::one(), y: BigUint::one(), z: BigUint::zero() }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

/// Short Weierstrass curve `y² = x³ + ax + b` over `GF(p)` with a generator
/// of prime order `n` and cofactor 1.
struct Curve {
    p: BigUint,
    a: BigUint,
    b: BigUint,
    n: BigUint,
    g: AffinePoint,
    /// `p - 2`, for inversion by Fermat
    inv_exp: BigUint,
    /// `(p + 1) / 4`, for square roots (p ≡ 3 mod 4)
    sqrt_exp: BigUint,
}

impl Curve {
    fn secp160r1() -> Self {
        let p = BigUint::from_bytes_be(&P);
        let inv_exp = &p - 2u32;
        let sqrt_exp = (&p + 1u32) >> 2;

        Self {
            a: BigUint::from_bytes_be(&A),
            b: BigUint::from_bytes_be(&B),
            n: BigUint::from_bytes_be(&N),
            g: AffinePoint { x: BigUint::from_bytes_be(&GX), y: BigUint::from_bytes_be(&GY) },
            p,
            inv_exp,
            sqrt_exp,
        }
    }

    fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.p
    }

    /// Operands must already be reduced.
    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + &self.p - b) % &self.p
    }

    fn mul_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    fn scale(&self, k: u32, a: &BigUint) -> BigUint {
        (a * k) % &self.p
    }

    fn inv(&self, a: &BigUint) -> BigUint {
        a.modpow(&self.inv_exp, &self.p)
    }

    /// Right-hand side of the curve equation for `x`.
    fn rhs(&self, x: &BigUint) -> BigUint {
        let x3 = self.mul_mod(&self.mul_mod(x, x), x);
        let ax = self.mul_mod(&self.a, x);
        self.add(&self.add(&x3, &ax), &self.b)
    }

    fn decompress(&self, bytes: &[u8]) -> Option<AffinePoint> {
        let (&prefix, x_bytes) = bytes.split_first()?;
        if bytes.len() != POINT_SIZE {
            return None;
        }

        let odd = match prefix {
            0x02 => false,
            0x03 => true,
            _ => return None,
        };

        let x = BigUint::from_bytes_be(x_bytes);
        if x >= self.p {
            return None;
        }

        let rhs = self.rhs(&x);
        let mut y = rhs.modpow(&self.sqrt_exp, &self.p);
        if self.mul_mod(&y, &y) != rhs {
            return None;
        }

        if y.bit(0) != odd {
            if y.is_zero() {
                return None;
            }
            y = &self.p - &y;
        }

        Some(AffinePoint { x, y })
    }

    fn double(&self, pt: &Jacobian) -> Jacobian {
        if pt.is_infinity() || pt.y.is_zero() {
            return Jacobian::infinity();
        }

        let xx = self.mul_mod(&pt.x, &pt.x);
        let yy = self.mul_mod(&pt.y, &pt.y);
        let yyyy = self.mul_mod(&yy, &yy);
        let zz = self.mul_mod(&pt.z, &pt.z);

        // S = 4·X·Y², M = 3·X² + a·Z⁴
        let s = self.scale(4, &self.mul_mod(&pt.x, &yy));
        let m = self.add(&self.scale(3, &xx), &self.mul_mod(&self.a, &self.mul_mod(&zz, &zz)));

        let x3 = self.sub(&self.mul_mod(&m, &m), &self.scale(2, &s));
        let y3 = self.sub(&self.mul_mod(&m, &self.sub(&s, &x3)), &self.scale(8, &yyyy));
        let z3 = self.scale(2, &self.mul_mod(&pt.y, &pt.z));

        Jacobian { x: x3, y: y3, z: z3 }
    }

    /// Mixed addition `pt + q` with `q` affine.
    fn add_affine(&self, pt: &Jacobian, q: &AffinePoint) -> Jacobian {
        if pt.is_infinity() {
            return Jacobian { x: q.x.clone(), y: q.y.clone(), z: BigUint::one() };
        }

        let z1z1 = self.mul_mod(&pt.z, &pt.z);
        let u2 = self.mul_mod(&q.x, &z1z1);
        let s2 = self.mul_mod(&q.y, &self.mul_mod(&pt.z, &z1z1));

        let h = self.sub(&u2, &pt.x);
        let r = self.sub(&s2, &pt.y);

        if h.is_zero() {
            return if r.is_zero() { self.double(pt) } else { Jacobian::infinity() };
        }

        let hh = self.mul_mod(&h, &h);
        let hhh = self.mul_mod(&h, &hh);
        let v = self.mul_mod(&pt.x, &hh);

        let x3 = self.sub(&self.sub(&self.mul_mod(&r, &r), &hhh), &self.scale(2, &v));
        let y3 = self.sub(&self.mul_mod(&r, &self.sub(&v, &x3)), &self.mul_mod(&pt.y, &hhh));
        let z3 = self.mul_mod(&pt.z, &h);

        Jacobian { x: x3, y: y3, z: z3 }
    }

    fn to_affine(&self, pt: &Jacobian) -> Option<AffinePoint> {
        if pt.is_infinity() {
            return None;
        }

        let z_inv = self.inv(&pt.z);
        let z_inv2 = self.mul_mod(&z_inv, &z_inv);
        let x = self.mul_mod(&pt.x, &z_inv2);
        let y = self.mul_mod(&pt.y, &self.mul_mod(&z_inv2, &z_inv));

        Some(AffinePoint { x, y })
    }

    /// `k · base`; `None` when the result is the point at infinity.
    fn mul(&self, k: &BigUint, base: &AffinePoint) -> Option<AffinePoint> {
        let k = k % &self.n;
        if k.is_zero() {
            return None;
        }

        let mut acc = Jacobian::infinity();
        for i in (0..k.bits()).rev() {
            acc = self.double(&acc);
            if k.bit(i) {
                acc = self.add_affine(&acc, base);
            }
        }

        self.to_affine(&acc)
    }

    #[cfg(test)]
    fn is_on_curve(&self, pt: &AffinePoint) -> bool {
        pt.x < self.p && pt.y < self.p && self.mul_mod(&pt.y, &pt.y) == self.rhs(&pt.x)
    }
}
