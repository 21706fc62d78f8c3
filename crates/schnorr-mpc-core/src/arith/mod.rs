//! Field and point arithmetic over secp256k1
//!
//! Reference implementation on arbitrary-precision integers. Every function is
//! pure over the constants held by [`Curve`].

mod curve;
mod point;

pub use curve::{Curve, FieldElement, Scalar};
pub use point::{Point, COMPRESSED_POINT_LEN};

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// bytes(x): 32-byte big-endian encoding, left-padded with zeros.
pub fn int_to_bytes(x: &BigUint) -> [u8; 32] {
    let be = x.to_bytes_be();
    let mut bytes = [0u8; 32];
    if be.len() > 32 {
        bytes.copy_from_slice(&be[be.len() - 32..]);
    } else {
        bytes[32 - be.len()..].copy_from_slice(&be);
    }
    bytes
}

/// int(x): big-endian unsigned integer
pub fn int_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// SHA-256 over the concatenation of `parts`
pub fn hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
