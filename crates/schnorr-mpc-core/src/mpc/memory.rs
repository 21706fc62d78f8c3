//! In-process relay

use super::{async_trait, Relay};
use crate::{Error, PartyId, Result, SessionId};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// Where a message is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Mailbox {
    Broadcast(SessionId, u32),
    Direct(SessionId, u32, PartyId),
}

/// Relay that keeps every round's messages in shared memory.
///
/// Cloning yields another handle onto the same mailboxes, so each simulated
/// party can own one.
#[derive(Clone)]
pub struct MemoryRelay {
    mailboxes: Arc<DashMap<Mailbox, Vec<Vec<u8>>>>,
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            mailboxes: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Number of messages queued in a broadcast round
    pub fn broadcast_len(&self, session_id: &SessionId, round: u32) -> usize {
        self.mailboxes
            .get(&Mailbox::Broadcast(*session_id, round))
            .map_or(0, |messages| messages.len())
    }

    fn post<T: Serialize>(&self, mailbox: Mailbox, message: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec(message).map_err(|e| Error::Serialization(e.to_string()))?;
        self.mailboxes.entry(mailbox).or_default().push(bytes);
        trace!(?mailbox, "Message queued");

        // No receivers just means nobody is waiting yet
        let _ = self.notify.send(());
        Ok(())
    }

    async fn wait_for<T: DeserializeOwned + Send>(
        &self,
        mailbox: Mailbox,
        count: usize,
    ) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.mailboxes.get(&mailbox) {
                if messages.len() >= count {
                    return messages
                        .iter()
                        .take(count)
                        .map(|bytes| {
                            serde_json::from_slice(bytes)
                                .map_err(|e| Error::Deserialization(e.to_string()))
                        })
                        .collect();
                }
            }

            // Re-check periodically in case a notification was missed
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
            }
        }
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()> {
        self.post(Mailbox::Broadcast(*session_id, round), message)
    }

    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()> {
        self.post(Mailbox::Direct(*session_id, round, to), message)
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>> {
        self.wait_for(Mailbox::Broadcast(*session_id, round), count)
            .await
    }

    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
    ) -> Result<Vec<T>> {
        self.wait_for(Mailbox::Direct(*session_id, round, my_id), count)
            .await
    }
}
