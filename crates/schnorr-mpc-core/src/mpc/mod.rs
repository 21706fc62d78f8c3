//! Message delivery between ceremony participants
//!
//! Sessions never talk to the network themselves. The async drivers move
//! serialized round messages through a [`Relay`]; delivery order, retries and
//! channel authentication belong to the relay implementation.

use crate::{PartyId, Result, SessionId};
use serde::{de::DeserializeOwned, Serialize};

pub use ::async_trait::async_trait;

/// Message relay trait for ceremony communication
#[async_trait]
pub trait Relay: Send + Sync {
    /// Broadcast a message to every participant of the session
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()>;

    /// Send a message to one participant
    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()>;

    /// Wait for `count` broadcasts of a round, our own included
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>>;

    /// Wait for `count` direct messages addressed to `my_id`
    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
    ) -> Result<Vec<T>>;
}

/// In-memory relay for tests and local simulation
pub mod memory;

pub use memory::MemoryRelay;
