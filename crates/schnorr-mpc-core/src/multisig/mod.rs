//! n-of-n Schnorr signature aggregation
//!
//! u signers produce one signature under P = Σ P_i. Nonce points are committed
//! by hash before they are revealed, and every partial signature is checked
//! against its sender's public key and nonce point before it is summed.

mod aggregate;
mod messages;
mod session;

pub use aggregate::run_aggregation;
pub use messages::*;
pub use session::AggregationSession;
