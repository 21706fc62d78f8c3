//! # Schnorr MPC Core
//!
//! Schnorr signatures over secp256k1 and two multi-party extensions built on
//! the same signing equation.
//!
//! This crate provides:
//! - Field and point arithmetic on arbitrary-precision integers
//! - Single-key Schnorr signing and verification
//! - n-of-n signature aggregation with nonce commit-then-reveal
//! - t-of-k threshold keys via Pedersen VSS, and threshold signing with
//!   Lagrange recombination
//!
//! ## Protocol Overview
//!
//! Every multi-party output is an ordinary Schnorr signature: it verifies with
//! [`schnorr::verify`] against the summed (n-of-n) or shared (threshold)
//! public key. Sessions are plain state machines; hosts feed peer values to
//! the setters, which validate before storing. The async drivers in
//! [`multisig`] and [`threshold`] run a whole ceremony over an [`mpc::Relay`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use schnorr_mpc_core::{threshold, ThresholdConfig};
//!
//! // Run distributed key generation
//! let key_share = threshold::run_dkg(dkg_session, &session_id, &relay).await?;
//!
//! // Sign a message with t collaborators
//! let signature = threshold::run_signing(signing_session, &message, &session_id, &relay).await?;
//! ```

pub mod arith;
pub mod backend;
pub mod error;
pub mod mpc;
pub mod multisig;
pub mod schnorr;
pub mod threshold;
pub mod types;

pub use error::{Error, Result, Value};
pub use types::{PartyId, SessionId, Signature, ThresholdConfig};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of key holders
pub const DEFAULT_HOLDERS: usize = 3;

/// Route ceremony logs to the test harness; `RUST_LOG` selects the level.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
