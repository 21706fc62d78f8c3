//! Core types shared by the signing protocols

use crate::arith::{Curve, Point};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// 1-based identifier of a participant
pub type PartyId = usize;

/// Unique identifier for a ceremony on the relay
pub type SessionId = [u8; 32];

/// Length of a serialized signature
pub const SIGNATURE_LEN: usize = 64;

/// Length of a signed message
pub const MESSAGE_LEN: usize = 32;

/// Fresh random session identifier
pub fn new_session_id() -> SessionId {
    rand::random()
}

/// Schnorr signature (r, s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// x-coordinate of the nonce point R
    pub r: [u8; 32],
    /// s = k + e·d mod n
    pub s: [u8; 32],
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Self { r, s }
    }

    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Split a 64-byte signature; no range checks on r or s.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(Error::InvalidSignatureLength(bytes.len()));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self { r, s })
    }
}

/// Parse a message, which must be exactly 32 bytes.
pub fn message_from_slice(bytes: &[u8]) -> Result<[u8; MESSAGE_LEN]> {
    bytes
        .try_into()
        .map_err(|_| Error::InvalidMessageLength(bytes.len()))
}

/// Parameters of a t-of-k threshold key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdConfig {
    /// Number of key holders k
    pub holders: usize,
    /// Number of collaborators t needed to sign
    pub threshold: usize,
    /// Blinding generator H for Pedersen commitments
    pub blinding_generator: Point,
}

impl ThresholdConfig {
    /// Tag hashed into the default blinding generator
    pub const BLINDING_GENERATOR_TAG: &'static [u8] = b"schnorr-mpc/pedersen/H";

    /// Create a new threshold configuration
    pub fn new(
        curve: &Curve,
        holders: usize,
        threshold: usize,
        blinding_generator: Point,
    ) -> Result<Self> {
        if threshold > holders {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of holders".into(),
            ));
        }
        if threshold < 1 {
            return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
        }
        if !curve.on_curve(&blinding_generator) {
            return Err(Error::PointNotOnCurve);
        }
        if blinding_generator.x() == curve.generator().x() {
            return Err(Error::InvalidConfig(
                "Blinding generator must be independent of G".into(),
            ));
        }

        Ok(Self {
            holders,
            threshold,
            blinding_generator,
        })
    }

    /// Configuration with H derived by hashing to the curve
    pub fn with_derived_generator(curve: &Curve, holders: usize, threshold: usize) -> Result<Self> {
        let h = curve.derive_generator(Self::BLINDING_GENERATOR_TAG);
        Self::new(curve, holders, threshold, h)
    }

    /// Reject indices outside 1..=k
    pub fn check_holder(&self, party: PartyId) -> Result<()> {
        if party == 0 || party > self.holders {
            return Err(Error::InvalidPartyId(party));
        }
        Ok(())
    }
}
