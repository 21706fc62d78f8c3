//! Error types for Schnorr signing and the multi-party ceremonies

use crate::PartyId;
use std::fmt;
use thiserror::Error;

/// Result type alias for Schnorr operations
pub type Result<T> = std::result::Result<T, Error>;

/// A contribution a session waits for from one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    PublicKey,
    NonceCommitment,
    NoncePoint,
    PartialSignature,
    Commitments,
    Share,
    Points,
    Message,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Value::PublicKey => "public key",
            Value::NonceCommitment => "nonce commitment",
            Value::NoncePoint => "nonce point",
            Value::PartialSignature => "partial signature",
            Value::Commitments => "polynomial commitments",
            Value::Share => "secret share",
            Value::Points => "coefficient points",
            Value::Message => "message",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during signing, verification and ceremony execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Message is not 32 bytes
    #[error("Invalid message length: expected 32 bytes, got {0}")]
    InvalidMessageLength(usize),

    /// Signature is not 64 bytes
    #[error("Invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Secret key outside [1, n)
    #[error("Secret key out of range")]
    InvalidSecretKey,

    /// Compressed point has the wrong length or prefix, or no matching y exists
    #[error("Invalid point encoding")]
    InvalidPointEncoding,

    /// Point does not satisfy the curve equation
    #[error("Point is not on the curve")]
    PointNotOnCurve,

    /// The point at infinity has no encoding
    #[error("Point at infinity")]
    PointAtInfinity,

    /// Participant index outside the session's range
    #[error("Invalid party ID: {0}")]
    InvalidPartyId(PartyId),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Threshold requirements not met
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// A peer-supplied scalar is not below the curve order
    #[error("Scalar from party {party} is out of range")]
    ScalarOutOfRange { party: PartyId },

    /// A peer published the wrong number of polynomial commitments
    #[error("Party {party} sent {actual} commitments, expected {expected}")]
    CommitmentCount {
        party: PartyId,
        expected: usize,
        actual: usize,
    },

    /// A required value has not been received yet
    #[error("Missing {value} from party {party}")]
    Missing { party: PartyId, value: Value },

    /// A value for this peer was already accepted
    #[error("Already received {value} from party {party}")]
    AlreadyReceived { party: PartyId, value: Value },

    /// The session was aborted by an earlier verification failure
    #[error("Session aborted after party {party} failed verification")]
    Aborted { party: PartyId },

    /// The DKG already produced its key share
    #[error("Key already established")]
    KeyAlreadyEstablished,

    /// Revealed nonce point does not hash to the stored commitment
    #[error("Nonce commitment mismatch for party {party}")]
    CommitmentMismatch { party: PartyId },

    /// Secret share does not match the sender's Pedersen commitments
    #[error("Share from party {party} does not match its commitments")]
    InvalidShare { party: PartyId },

    /// Coefficient points do not match the share already received
    #[error("Coefficient points from party {party} do not match its share")]
    InvalidPoints { party: PartyId },

    /// A peer relayed a commitment set that differs from the one we received
    #[error("Party {party} relayed commitments of party {subject} that differ from ours")]
    InconsistentCommitments { party: PartyId, subject: PartyId },

    /// Partial signature does not verify against the sender's public values
    #[error("Partial signature from party {party} failed verification")]
    InvalidPartialSignature { party: PartyId },

    /// Signature failed verification
    #[error("Invalid signature")]
    InvalidSignature,

    /// An aggregate point came out as infinity
    #[error("Degenerate point in {0}")]
    DegeneratePoint(&'static str),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),
}

impl Error {
    /// The peer whose contribution failed a cryptographic check, if any.
    pub fn culprit(&self) -> Option<PartyId> {
        match self {
            Error::CommitmentMismatch { party }
            | Error::InvalidShare { party }
            | Error::InvalidPoints { party }
            | Error::InconsistentCommitments { party, .. }
            | Error::InvalidPartialSignature { party } => Some(*party),
            _ => None,
        }
    }

    /// Whether the error only means a value has not arrived yet.
    pub fn is_missing(&self) -> bool {
        matches!(self, Error::Missing { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
