//! Threshold message types
//!
//! Key generation and signing use the same three VSS messages; signing adds
//! one round of partial signatures.

use crate::arith::{Curve, Point};
use crate::{PartyId, Result};
use serde::{Deserialize, Serialize};

/// VSS round 1: Pedersen commitments C_0..C_(t-1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentsMessage {
    /// Sender party ID
    pub party_id: PartyId,
    /// Compressed commitment points
    pub commitments: Vec<Vec<u8>>,
}

/// Commitments of a third party, as the sender received them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedCommitments {
    pub party_id: PartyId,
    pub commitments: Vec<Vec<u8>>,
}

/// VSS round 2: the share dealt to one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareMessage {
    /// Dealer
    pub from: PartyId,
    /// Receiver
    pub to: PartyId,
    /// f(to)
    pub share: [u8; 32],
    /// f'(to)
    pub blinding_share: [u8; 32],
    /// Every other member's commitments, for the consistency check
    pub relayed: Vec<RelayedCommitments>,
}

/// VSS round 3: coefficient points A_0..A_(t-1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsMessage {
    pub party_id: PartyId,
    pub points: Vec<Vec<u8>>,
}

/// Signing round 4: partial signature σ_i
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSignatureMessage {
    pub party_id: PartyId,
    pub partial_signature: [u8; 32],
}

/// Compressed encodings of a list of points
pub fn encode_points(points: &[Point]) -> Result<Vec<Vec<u8>>> {
    points
        .iter()
        .map(|point| -> Result<Vec<u8>> { Ok(point.to_bytes()?.to_vec()) })
        .collect()
}

/// Decode a list of compressed points
pub fn decode_points(curve: &Curve, encoded: &[Vec<u8>]) -> Result<Vec<Point>> {
    encoded
        .iter()
        .map(|bytes| curve.decode_point(bytes))
        .collect()
}
