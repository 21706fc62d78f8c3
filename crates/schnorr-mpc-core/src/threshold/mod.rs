//! t-of-k threshold Schnorr
//!
//! Key generation and signing share one structure: a two-polynomial Pedersen
//! VSS round. DKG runs it over all k holders to establish a [`KeyShare`];
//! each signing ceremony runs it again over exactly t collaborators to share a
//! one-time nonce, then combines partial signatures with Lagrange weights.

mod dkg;
mod messages;
pub mod polynomial;
mod sign;
pub mod vss;

pub use dkg::{run_dkg, DkgSession, KeyShare};
pub use messages::*;
pub use polynomial::{evaluate_commitments, lagrange_coefficient_at_zero, Polynomial};
pub use sign::{run_signing, SigningSession};
pub use vss::VssRound;

use crate::PartyId;

/// Progress of a DKG or signing session.
///
/// DKG goes from `Ready` to `KeyEstablished`. Signing reports
/// `PointsVerified` once the nonce R is known, `Ready` once every partial
/// signature is verified, then `SignatureProduced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    CommitmentsCollected,
    SharesVerified,
    PointsVerified,
    Ready,
    KeyEstablished,
    SignatureProduced,
    /// Terminal; `party` failed a verification check
    Aborted { party: PartyId },
}
