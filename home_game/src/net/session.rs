//! Session directory: persistent user id to live transport handle.
//!
//! A handle survives for the life of one WebSocket connection; a reconnect
//! replaces it under the same user id, which is how anonymous `anon_…` ids
//! keep their seat binding across drops. Lookups evict handles whose
//! channel has closed.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

use super::events::ServerEvent;
use crate::game::player::UserId;

/// Outbound channel to one connected client. The WebSocket task drains the
/// receiver and serializes onto the socket.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    user_id: UserId,
    sender: mpsc::Sender<ServerEvent>,
}

impl ClientHandle {
    #[must_use]
    pub fn new(user_id: UserId, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { user_id, sender }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue an event without blocking the caller. A full or closed channel
    /// drops the event; delivery to a slow consumer must never stall a
    /// room.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("outbound channel full for {}, dropping event", self.user_id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Maps persistent user ids to their current transport.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    inner: RwLock<HashMap<UserId, ClientHandle>>,
}

impl SessionDirectory {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace the transport for a user.
    pub async fn connect(&self, handle: ClientHandle) {
        let mut inner = self.inner.write().await;
        inner.insert(handle.user_id().clone(), handle);
    }

    /// Current transport for a user. Stale handles are evicted lazily.
    pub async fn get(&self, user_id: &UserId) -> Option<ClientHandle> {
        {
            let inner = self.inner.read().await;
            match inner.get(user_id) {
                Some(handle) if handle.is_connected() => return Some(handle.clone()),
                None => return None,
                Some(_) => {}
            }
        }
        let mut inner = self.inner.write().await;
        if inner.get(user_id).is_some_and(|h| !h.is_connected()) {
            debug!("evicting stale session for {user_id}");
            inner.remove(user_id);
        }
        None
    }

    /// Remove a user's transport if `sender` is still the registered one.
    pub async fn disconnect(&self, user_id: &UserId, sender: &mpsc::Sender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        if inner
            .get(user_id)
            .is_some_and(|h| h.sender.same_channel(sender))
        {
            inner.remove(user_id);
        }
    }

    pub async fn connected_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.values().filter(|h| h.is_connected()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: &str, capacity: usize) -> (ClientHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientHandle::new(id.to_string(), tx), rx)
    }

    #[tokio::test]
    async fn connect_replaces_previous_handle() {
        let sessions = SessionDirectory::new();
        let (first, _rx1) = handle("anon_user1234", 8);
        let (second, mut rx2) = handle("anon_user1234", 8);
        sessions.connect(first).await;
        sessions.connect(second).await;

        let current = sessions.get(&"anon_user1234".to_string()).await.unwrap();
        assert!(current.send(ServerEvent::error(
            super::super::events::ErrorCode::NotInRoom,
            "test"
        )));
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn lookup_evicts_closed_handles() {
        let sessions = SessionDirectory::new();
        let (h, rx) = handle("anon_user1234", 8);
        sessions.connect(h).await;
        drop(rx);
        assert!(sessions.get(&"anon_user1234".to_string()).await.is_none());
        assert_eq!(sessions.connected_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_ignores_superseded_handles() {
        let sessions = SessionDirectory::new();
        let (old, _old_rx) = handle("anon_user1234", 8);
        let old_sender = {
            let (tx, _rx) = mpsc::channel(1);
            drop(_rx);
            tx
        };
        sessions.connect(old).await;
        // A disconnect from a connection that was already replaced must not
        // evict the live one.
        sessions
            .disconnect(&"anon_user1234".to_string(), &old_sender)
            .await;
        assert!(sessions.get(&"anon_user1234".to_string()).await.is_some());
    }
}
