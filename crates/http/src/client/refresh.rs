//! Single-flight token refresh
//!
//! The first caller to need a refresh starts it and parks the pending future in
//! a shared slot. Anyone else who needs a refresh for the same refresh token
//! while it is pending awaits the same future instead of calling the refresh
//! endpoint again. The refresh clears its own slot when it settles, and on
//! native targets it runs on its own task, so it settles even if every caller
//! gives up waiting.

use super::error::RefreshError;
use futures::FutureExt;
use futures::future::Shared;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use vetdesk_core::TokenPair;

pub(crate) type RefreshOutcome = Result<TokenPair, RefreshError>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type RefreshFuture = futures::future::BoxFuture<'static, RefreshOutcome>;
#[cfg(target_arch = "wasm32")]
pub(crate) type RefreshFuture = futures::future::LocalBoxFuture<'static, RefreshOutcome>;

type Slot = Arc<Mutex<Option<InFlight>>>;

struct InFlight {
    id: u64,
    refresh_token: String,
    future: Shared<RefreshFuture>,
}

#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    in_flight: Slot,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    /// Join the pending refresh for `refresh_token`, or start one with `start`.
    ///
    /// A pending refresh for a different refresh token belongs to an older
    /// session and is never joined.
    pub(crate) async fn run<F>(&self, refresh_token: &str, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> RefreshFuture,
    {
        let future = {
            let mut slot = lock(&self.in_flight);
            let joinable = slot
                .as_ref()
                .filter(|in_flight| in_flight.refresh_token == refresh_token)
                .map(|in_flight| (in_flight.id, in_flight.future.clone()));

            if let Some((id, future)) = joinable {
                debug!(refresh_id = id, "Joining in-flight token refresh");
                future
            } else {
                if let Some(stale) = slot.as_ref() {
                    debug!(refresh_id = stale.id, "Pending refresh is for another session, not joining it");
                }
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let future = self.settling(id, start());
                *slot = Some(InFlight {
                    id,
                    refresh_token: refresh_token.to_string(),
                    future: future.clone(),
                });
                debug!(refresh_id = id, "Starting token refresh");
                drive(future.clone());
                future
            }
        };

        future.await
    }

    /// Whether a refresh is currently pending
    pub(crate) fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Wrap `refresh` so it empties its own slot once it settles
    fn settling(&self, id: u64, refresh: RefreshFuture) -> Shared<RefreshFuture> {
        let slot = Arc::clone(&self.in_flight);
        let future = async move {
            let outcome = refresh.await;
            let mut slot = lock(&slot);
            if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
                *slot = None;
            }
            outcome
        };

        #[cfg(not(target_arch = "wasm32"))]
        let future = future.boxed();
        #[cfg(target_arch = "wasm32")]
        let future = future.boxed_local();
        future.shared()
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<InFlight>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(not(target_arch = "wasm32"))]
fn drive(future: Shared<RefreshFuture>) {
    tokio::spawn(future);
}

// No task to hand it to; the callers drive it
#[cfg(target_arch = "wasm32")]
fn drive(_future: Shared<RefreshFuture>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_refresh(calls: Arc<AtomicUsize>, outcome: RefreshOutcome) -> RefreshFuture {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            outcome
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let coordinator = Arc::new(RefreshCoordinator::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .run("r1", || counting_refresh(calls, Ok(TokenPair::new("a2", "r2"))))
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), TokenPair::new("a2", "r2"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_slot_is_released() {
        let coordinator = RefreshCoordinator::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = RefreshError::new(Some(401), "refresh token revoked");

        let (first, second) = tokio::join!(
            coordinator.run("r1", || counting_refresh(Arc::clone(&calls), Err(failure.clone()))),
            coordinator.run("r1", || counting_refresh(Arc::clone(&calls), Ok(TokenPair::new("x", "y")))),
        );
        assert_eq!(first.unwrap_err(), failure);
        assert_eq!(second.unwrap_err(), failure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Settled refreshes are not reused
        let third = coordinator
            .run("r1", || counting_refresh(Arc::clone(&calls), Ok(TokenPair::new("a3", "r3"))))
            .await;
        assert_eq!(third.unwrap(), TokenPair::new("a3", "r3"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_refresh_still_settles_and_frees_the_slot() {
        let coordinator = RefreshCoordinator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            coordinator.run("r1", || counting_refresh(Arc::clone(&calls), Ok(TokenPair::new("a2", "r2")))),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(coordinator.is_refreshing());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!coordinator.is_refreshing());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_for_another_token_is_not_joined() {
        let coordinator = RefreshCoordinator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (old, new) = tokio::join!(
            coordinator.run("r1", || counting_refresh(Arc::clone(&calls), Err(RefreshError::new(Some(401), "revoked")))),
            coordinator.run("r9", || counting_refresh(Arc::clone(&calls), Ok(TokenPair::new("a10", "r10")))),
        );

        assert!(old.is_err());
        assert_eq!(new.unwrap(), TokenPair::new("a10", "r10"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
