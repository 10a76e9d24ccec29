// Refresh coordination
// Guarantees at most one refresh call per expiry event and fans the outcome
// out to every request that was waiting on it

use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::error::RefreshError;

use super::refresh::TokenRefresher;
use super::session::SessionEvents;
use super::store::TokenStore;

type Outcome = std::result::Result<String, RefreshError>;

/// Serializes refresh cycles against the shared credential.
///
/// The guarded `Option` is both the in-progress flag and the waiter queue:
/// `Some` means a cycle is running and late arrivals enqueue a completion
/// handle; `None` means the next authorization failure starts a new cycle.
/// The check-and-claim happens under a single lock guard with no await point
/// in between, so two requests failing in the same scheduler turn cannot
/// both become the leader.
pub struct RefreshCoordinator {
    inflight: Mutex<Option<Vec<oneshot::Sender<Outcome>>>>,
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    session: Arc<SessionEvents>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        session: Arc<SessionEvents>,
    ) -> Self {
        Self {
            inflight: Mutex::new(None),
            store,
            refresher,
            session,
        }
    }

    /// Obtain a fresh token, joining the running cycle if one exists.
    ///
    /// The first caller becomes the leader: it performs the refresh with the
    /// token that is current right now, stores the replacement, and settles
    /// the queue. Late callers suspend until the cycle settles and receive
    /// the shared outcome.
    pub async fn refresh_token(&self) -> Outcome {
        let waiter = {
            let mut inflight = self.inflight.lock().await;
            match inflight.as_mut() {
                Some(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    tracing::debug!(queued = queue.len(), "Refresh in progress, waiting");
                    Some(rx)
                }
                None => {
                    *inflight = Some(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(RefreshError::Transport(
                    "refresh cycle interrupted".to_string(),
                ))
            });
        }

        let outcome = self.run_cycle().await;

        // Settle the queue and clear the in-progress flag, success or not,
        // so the next expiry can start a new cycle
        let waiters = self.inflight.lock().await.take().unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }

        outcome
    }

    /// Leader path: one refresh call, then store update or forced logout
    async fn run_cycle(&self) -> Outcome {
        let expiring = self.store.get().await;
        tracing::info!("Starting token refresh cycle");

        let outcome = self.refresher.refresh(expiring.as_deref()).await;

        match &outcome {
            Ok(token) => {
                self.store.set(token).await;
                tracing::info!("Token refresh cycle succeeded");
            }
            Err(e) => {
                self.session.force_logout(&e.to_string()).await;
            }
        }

        outcome
    }
}
