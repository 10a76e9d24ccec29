// Session termination
// Brings the application to a safe, logged-out state when refresh is not
// recoverable

use std::sync::Arc;
use tokio::sync::broadcast;

use super::store::TokenStore;

/// Notification that the session ended and the user must authenticate again
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Expired { reason: String },
}

/// Clears credentials and broadcasts the forced logout to subscribers.
///
/// Consumers subscribe before issuing requests; when refresh fails
/// terminally they receive exactly one `Expired` event per failed cycle
/// and are expected to drop all state tied to the stale session.
pub struct SessionEvents {
    store: Arc<TokenStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(store: Arc<TokenStore>) -> Self {
        let (events, _) = broadcast::channel(8);
        Self { store, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Clear credentials and notify subscribers of the forced logout
    pub async fn force_logout(&self, reason: &str) {
        self.store.clear().await;
        tracing::warn!(reason, "Session terminated, credentials cleared");

        // Send fails only when nobody is subscribed, which is fine
        let _ = self.events.send(SessionEvent::Expired {
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_force_logout_clears_store_and_notifies() {
        let store = Arc::new(TokenStore::in_memory().unwrap());
        store.set("T1").await;

        let session = SessionEvents::new(store.clone());
        let mut events = session.subscribe();

        session.force_logout("refresh rejected").await;

        assert_eq!(store.get().await, None);
        let SessionEvent::Expired { reason } = events.try_recv().unwrap();
        assert_eq!(reason, "refresh rejected");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_force_logout_without_subscribers() {
        let store = Arc::new(TokenStore::in_memory().unwrap());
        store.set("T1").await;

        let session = SessionEvents::new(store.clone());
        session.force_logout("refresh rejected").await;

        assert_eq!(store.get().await, None);
    }
}
