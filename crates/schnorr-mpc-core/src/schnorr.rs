//! Single-key Schnorr signatures
//!
//! Nonces are derived deterministically as `int(hash(bytes(d) || m)) mod n` and
//! negated when needed so that the published R always has a quadratic-residue
//! y-coordinate. The challenge is `int(hash(bytes(x(R)) || bytes(P) || m)) mod n`.
//!
//! [`verify`] is also the acceptance check for the output of the aggregated and
//! threshold ceremonies.

use crate::arith::{int_from_bytes, int_to_bytes, Curve, Point, Scalar};
use crate::backend::CurveBackend;
use crate::types::{message_from_slice, MESSAGE_LEN};
use crate::{Error, Result, Signature};
use rand_core::CryptoRngCore;

/// A secret key; the public point is always recomputed from it.
#[derive(Clone)]
pub struct Keypair {
    secret: Scalar,
}

impl Keypair {
    /// Wrap a secret key, which must be in [1, n).
    pub fn new(curve: &Curve, secret: Scalar) -> Result<Self> {
        if !curve.is_valid_secret(&secret) {
            return Err(Error::InvalidSecretKey);
        }
        Ok(Self { secret })
    }

    pub fn random(curve: &Curve, rng: &mut impl CryptoRngCore) -> Self {
        Self {
            secret: curve.random_scalar(rng),
        }
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    /// P = d·G
    pub fn public_key(&self, curve: &Curve) -> Point {
        curve.mul_base(&self.secret)
    }

    pub fn sign(&self, curve: &Curve, message: &[u8]) -> Result<Signature> {
        sign(curve, &self.secret, message)
    }
}

/// k = int(hash(bytes(d) || m)) mod n
pub fn derive_nonce(curve: &Curve, secret: &Scalar, message: &[u8; MESSAGE_LEN]) -> Scalar {
    curve.hash_to_scalar(&[&int_to_bytes(secret)[..], &message[..]])
}

/// e = int(hash(bytes(r) || bytes(P) || m)) mod n
pub fn challenge<B: CurveBackend + ?Sized>(
    backend: &B,
    r: &[u8; 32],
    public_key: &Point,
    message: &[u8; MESSAGE_LEN],
) -> Result<Scalar> {
    let encoded = backend.encode(public_key)?;
    Ok(backend.curve().hash_to_scalar(&[&r[..], &encoded[..], &message[..]]))
}

/// Sign a 32-byte message with secret key `secret`.
pub fn sign<B: CurveBackend + ?Sized>(
    backend: &B,
    secret: &Scalar,
    message: &[u8],
) -> Result<Signature> {
    let curve = backend.curve();
    if !curve.is_valid_secret(secret) {
        return Err(Error::InvalidSecretKey);
    }
    let message = message_from_slice(message)?;

    let mut k = derive_nonce(curve, secret, &message);
    let nonce_point = backend.mul_base(&k)?;
    let (rx, ry) = match &nonce_point {
        Point::Infinity => return Err(Error::DegeneratePoint("nonce")),
        Point::Affine { x, y } => (x, y),
    };
    if !curve.is_quadratic_residue(ry) {
        k = curve.scalar_neg(&k);
    }

    let public_key = backend.mul_base(secret)?;
    let r = int_to_bytes(rx);
    let e = challenge(backend, &r, &public_key, &message)?;
    let s = curve.scalar_add(&k, &curve.scalar_mul(&e, secret));

    Ok(Signature::new(r, int_to_bytes(&s)))
}

/// Verify a 64-byte signature over a 32-byte message.
pub fn verify<B: CurveBackend + ?Sized>(
    backend: &B,
    public_key: &Point,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let curve = backend.curve();
    let message = message_from_slice(message)?;
    let signature = Signature::from_slice(signature)?;
    if !backend.is_on_curve(public_key) {
        return Err(Error::PointNotOnCurve);
    }

    let r = int_from_bytes(&signature.r);
    if &r >= curve.p() {
        return Err(Error::InvalidSignature);
    }
    let s = int_from_bytes(&signature.s);
    if &s >= curve.n() {
        return Err(Error::InvalidSignature);
    }

    let e = challenge(backend, &signature.r, public_key, &message)?;
    // R = s·G - e·P
    let s_g = backend.mul_base(&s)?;
    let minus_e_p = backend.mul(&curve.scalar_neg(&e), public_key)?;
    match backend.add(&s_g, &minus_e_p)? {
        Point::Affine { x, y } if curve.is_quadratic_residue(&y) && x == r => Ok(()),
        _ => Err(Error::InvalidSignature),
    }
}
