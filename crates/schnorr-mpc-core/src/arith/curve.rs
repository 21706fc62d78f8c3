//! Curve constants and modular arithmetic over the field prime and the group order

use super::{hash, int_from_bytes, Point};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;

/// Integer in [0, n), arithmetic mod the curve order.
pub type Scalar = BigUint;

/// Integer in [0, p), arithmetic mod the field prime.
pub type FieldElement = BigUint;

const P_BYTES: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F,
];

const N_BYTES: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

const GX_BYTES: [u8; 32] = [
    0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87, 0x0B, 0x07,
    0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8, 0x17, 0x98,
];

const GY_BYTES: [u8; 32] = [
    0x48, 0x3A, 0xDA, 0x77, 0x26, 0xA3, 0xC4, 0x65, 0x5D, 0xA4, 0xFB, 0xFC, 0x0E, 0x11, 0x08, 0xA8,
    0xFD, 0x17, 0xB4, 0x48, 0xA6, 0x85, 0x54, 0x19, 0x9C, 0x47, 0xD0, 0x8F, 0xFB, 0x10, 0xD4, 0xB8,
];

/// Parameters of y² = x³ + 7 over the integers mod p.
///
/// Every arithmetic call takes the curve by reference; there is no global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    p: FieldElement,
    n: Scalar,
    b: FieldElement,
    g: Point,
    p_minus_two: BigUint,
    n_minus_two: BigUint,
    euler_exponent: BigUint,
    sqrt_exponent: BigUint,
}

impl Default for Curve {
    fn default() -> Self {
        Self::secp256k1()
    }
}

impl Curve {
    /// The secp256k1 parameters
    pub fn secp256k1() -> Self {
        let p = BigUint::from_bytes_be(&P_BYTES);
        let n = BigUint::from_bytes_be(&N_BYTES);
        let g = Point::Affine {
            x: BigUint::from_bytes_be(&GX_BYTES),
            y: BigUint::from_bytes_be(&GY_BYTES),
        };
        let one = BigUint::one();
        let two = BigUint::from(2u32);
        let four = BigUint::from(4u32);

        Self {
            p_minus_two: &p - &two,
            n_minus_two: &n - &two,
            euler_exponent: (&p - &one) / &two,
            // p ≡ 3 (mod 4), so a square root is a^((p+1)/4)
            sqrt_exponent: (&p + &one) / &four,
            b: BigUint::from(7u32),
            p,
            n,
            g,
        }
    }

    /// Field prime p
    pub fn p(&self) -> &FieldElement {
        &self.p
    }

    /// Group order n
    pub fn n(&self) -> &Scalar {
        &self.n
    }

    /// Base point G
    pub fn generator(&self) -> &Point {
        &self.g
    }

    /// Curve constant b (= 7)
    pub fn b(&self) -> &FieldElement {
        &self.b
    }

    /// Whether `d` is a usable secret key, i.e. in [1, n).
    pub fn is_valid_secret(&self, d: &Scalar) -> bool {
        !d.is_zero() && d < &self.n
    }

    pub fn reduce_scalar(&self, x: &BigUint) -> Scalar {
        x % &self.n
    }

    /// Big-endian bytes reduced mod n
    pub fn scalar_from_bytes(&self, bytes: &[u8]) -> Scalar {
        int_from_bytes(bytes) % &self.n
    }

    pub fn scalar_add(&self, a: &Scalar, b: &Scalar) -> Scalar {
        (a + b) % &self.n
    }

    pub fn scalar_mul(&self, a: &Scalar, b: &Scalar) -> Scalar {
        (a * b) % &self.n
    }

    /// n - a (mod n)
    pub fn scalar_neg(&self, a: &Scalar) -> Scalar {
        (&self.n - (a % &self.n)) % &self.n
    }

    pub fn scalar_sub(&self, a: &Scalar, b: &Scalar) -> Scalar {
        self.scalar_add(a, &self.scalar_neg(b))
    }

    /// Inverse mod n via Fermat's little theorem; `None` for zero.
    pub fn scalar_invert(&self, a: &Scalar) -> Option<Scalar> {
        let a = a % &self.n;
        if a.is_zero() {
            return None;
        }
        Some(a.modpow(&self.n_minus_two, &self.n))
    }

    /// base^exp mod n for small participant indices
    #[cfg(test)]
    pub(crate) fn scalar_pow(&self, base: u64, exp: usize) -> Scalar {
        BigUint::from(base).modpow(&BigUint::from(exp), &self.n)
    }

    /// 32 random bytes reduced mod n, resampled until non-zero.
    pub fn random_scalar(&self, rng: &mut impl CryptoRngCore) -> Scalar {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            let scalar = self.scalar_from_bytes(&bytes);
            if !scalar.is_zero() {
                return scalar;
            }
        }
    }

    /// int(sha256(parts...)) mod n
    pub fn hash_to_scalar(&self, parts: &[&[u8]]) -> Scalar {
        self.scalar_from_bytes(&hash(parts))
    }

    pub(crate) fn field_add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        (a + b) % &self.p
    }

    pub(crate) fn field_sub(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        (a + &self.p - (b % &self.p)) % &self.p
    }

    pub(crate) fn field_mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        (a * b) % &self.p
    }

    /// a^(p-2) mod p
    pub(crate) fn field_invert(&self, a: &FieldElement) -> FieldElement {
        a.modpow(&self.p_minus_two, &self.p)
    }

    /// Euler's criterion: x^((p-1)/2) mod p. One for non-zero squares, p-1 for non-squares.
    pub fn jacobi(&self, x: &FieldElement) -> FieldElement {
        x.modpow(&self.euler_exponent, &self.p)
    }

    pub fn is_quadratic_residue(&self, x: &FieldElement) -> bool {
        self.jacobi(x).is_one()
    }

    /// Square root mod p, if one exists.
    pub fn sqrt(&self, a: &FieldElement) -> Option<FieldElement> {
        let a = a % &self.p;
        let root = a.modpow(&self.sqrt_exponent, &self.p);
        if self.field_mul(&root, &root) == a {
            Some(root)
        } else {
            None
        }
    }

    /// Hash `tag ‖ counter` until the digest is an x-coordinate on the curve.
    ///
    /// Nobody knows the discrete log of the result relative to G, which makes it
    /// suitable as the blinding generator H of Pedersen commitments.
    pub fn derive_generator(&self, tag: &[u8]) -> Point {
        let mut counter: u32 = 0;
        loop {
            let x = int_from_bytes(&hash(&[tag, &counter.to_be_bytes()[..]]));
            if x < self.p {
                if let Some(point) = self.lift_x(&x, false) {
                    return point;
                }
            }
            counter = counter.wrapping_add(1);
        }
    }
}
