//! n-of-n aggregation message types
//!
//! Points travel as 33-byte compressed encodings, scalars as 32-byte
//! big-endian integers.

use crate::PartyId;
use serde::{Deserialize, Serialize};

/// Round 1 message: long-term public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyMessage {
    pub party_id: PartyId,
    pub public_key: Vec<u8>,
}

/// Round 2 message: hash of the nonce point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceCommitmentMessage {
    pub party_id: PartyId,
    pub commitment: [u8; 32],
}

/// Round 3 message: the committed nonce point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoncePointMessage {
    pub party_id: PartyId,
    pub nonce_point: Vec<u8>,
}

/// Round 4 message: partial signature s_i
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSignatureMessage {
    pub party_id: PartyId,
    pub partial_signature: [u8; 32],
}
