//! Delivery session registry
//!
//! Holds at most one session per chat, the cancellation token of its drain
//! and the drain task handle.

use super::session::DeliverySession;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<DeliverySession>>;

struct SessionSlot {
    session: SessionHandle,
    cancellation_token: CancellationToken,
    drain: Option<JoinHandle<()>>,
}

/// Session registry keyed by chat
///
/// Generic over the chat id type so the delivery core does not depend on
/// the transport's JID representation.
pub struct SessionRegistry<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> {
    slots: RwLock<HashMap<Id, SessionSlot>>,
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> Default
    for SessionRegistry<Id>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> SessionRegistry<Id> {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Install `session` for `id`, superseding any previous one.
    ///
    /// The previous session's drain is cancelled; it stops at its next file
    /// boundary and never touches the new session.
    pub async fn replace(
        &self,
        id: Id,
        session: DeliverySession,
    ) -> (SessionHandle, CancellationToken) {
        let handle = Arc::new(Mutex::new(session));
        let token = CancellationToken::new();
        let slot = SessionSlot {
            session: handle.clone(),
            cancellation_token: token.clone(),
            drain: None,
        };

        let previous = {
            let mut slots = self.slots.write().await;
            slots.insert(id.clone(), slot)
        };
        if let Some(previous) = previous {
            previous.cancellation_token.cancel();
            info!(chat_id = ?id, "Superseded previous delivery session");
        }

        (handle, token)
    }

    /// Get the current session if one exists
    pub async fn get(&self, id: &Id) -> Option<SessionHandle> {
        let slots = self.slots.read().await;
        slots.get(id).map(|slot| slot.session.clone())
    }

    /// Get the current session together with its drain cancellation token
    pub async fn get_with_token(&self, id: &Id) -> Option<(SessionHandle, CancellationToken)> {
        let slots = self.slots.read().await;
        slots
            .get(id)
            .map(|slot| (slot.session.clone(), slot.cancellation_token.clone()))
    }

    /// Returns true if `session` is still the registered session for `id`
    pub async fn is_current(&self, id: &Id, session: &SessionHandle) -> bool {
        let slots = self.slots.read().await;
        slots
            .get(id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.session, session))
    }

    /// Record the drain task of `session`; ignored if it was superseded
    pub async fn set_drain_handle(&self, id: &Id, session: &SessionHandle, handle: JoinHandle<()>) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(id) {
            if Arc::ptr_eq(&slot.session, session) {
                slot.drain = Some(handle);
            }
        }
    }

    /// Take the drain task handle so the caller can await it
    pub async fn take_drain_handle(&self, id: &Id) -> Option<JoinHandle<()>> {
        let mut slots = self.slots.write().await;
        slots.get_mut(id).and_then(|slot| slot.drain.take())
    }

    /// Returns true if a drain task is recorded and still running
    pub async fn is_draining(&self, id: &Id) -> bool {
        let slots = self.slots.read().await;
        slots
            .get(id)
            .and_then(|slot| slot.drain.as_ref())
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Remove `session` if it is still the registered one.
    ///
    /// Returns `true` if it was removed.
    pub async fn remove_if_current(&self, id: &Id, session: &SessionHandle) -> bool {
        let mut slots = self.slots.write().await;
        let is_current = slots
            .get(id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.session, session));
        if is_current {
            slots.remove(id);
            debug!(chat_id = ?id, "Delivery session removed");
        }
        is_current
    }

    /// Cancel every drain and drop all sessions
    pub async fn shutdown(&self) {
        let mut slots = self.slots.write().await;
        for slot in slots.values() {
            slot.cancellation_token.cancel();
        }
        slots.clear();
    }

    /// Get the number of live sessions
    pub async fn len(&self) -> usize {
        let slots = self.slots.read().await;
        slots.len()
    }

    /// Check if registry is empty
    pub async fn is_empty(&self) -> bool {
        let slots = self.slots.read().await;
        slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::session::BatchLimit;

    fn session(code: &str) -> DeliverySession {
        DeliverySession::new("chat", code, Vec::new(), BatchLimit::Bounded(10))
    }

    #[tokio::test]
    async fn test_replace_cancels_previous_drain() {
        let registry = SessionRegistry::<String>::new();
        let (first, first_token) = registry.replace("chat".into(), session("CS101")).await;
        assert!(registry.is_current(&"chat".into(), &first).await);

        let (second, second_token) = registry.replace("chat".into(), session("MTH302")).await;
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(!registry.is_current(&"chat".into(), &first).await);
        assert!(registry.is_current(&"chat".into(), &second).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_session_cannot_remove_current() {
        let registry = SessionRegistry::<String>::new();
        let (stale, _) = registry.replace("chat".into(), session("CS101")).await;
        let (current, _) = registry.replace("chat".into(), session("CS101")).await;

        assert!(!registry.remove_if_current(&"chat".into(), &stale).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove_if_current(&"chat".into(), &current).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_drain_handle_tracking() {
        let registry = SessionRegistry::<String>::new();
        let (current, _) = registry.replace("chat".into(), session("CS101")).await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = rx.await;
        });
        registry.set_drain_handle(&"chat".into(), &current, handle).await;
        assert!(registry.is_draining(&"chat".into()).await);

        let _ = tx.send(());
        let handle = registry.take_drain_handle(&"chat".into()).await;
        assert!(handle.is_some());
        if let Some(handle) = handle {
            handle.await.expect("drain task");
        }
        assert!(!registry.is_draining(&"chat".into()).await);
    }
}
