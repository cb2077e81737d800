//! Single-flight token refresh
//!
//! Concurrent 401 handlers all call [`RefreshCoordinator::refresh`]; the
//! first one starts the refresh and the rest wait on the same shared future.
//! The slot is emptied only after the refresh settles.

use crate::error::{ApiError, ApiResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

type SharedRefresh = Shared<BoxFuture<'static, ApiResult<String>>>;

/// One producer, many waiters
#[derive(Default)]
pub struct RefreshCoordinator {
    slot: Arc<Mutex<Option<SharedRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Join the in-flight refresh, or start one with `refresh_fn`
    ///
    /// Resolves to the new access token.
    pub async fn refresh<F, Fut>(&self, refresh_fn: F) -> ApiResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<String>> + Send + 'static,
    {
        let future = {
            let mut slot = self.slot.lock();
            if let Some(in_flight) = slot.as_ref() {
                debug!("Joining in-flight token refresh");
                in_flight.clone()
            } else {
                let refresh = refresh_fn();
                let release = Arc::clone(&self.slot);
                let handle = tokio::spawn(async move {
                    let result = refresh.await;
                    *release.lock() = None;
                    result
                });
                let shared = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(ApiError::transport(format!("Token refresh task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                *slot = Some(shared.clone());
                shared
            }
        };

        future.await
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

#[cfg(test)]
mod refresh_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_share_one_call() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(format!("token-{n}"))
            }
        };

        let results = futures::future::join_all((0..5).map(|_| coordinator.refresh(make()))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), "token-0");
        }
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_cleared_after_settlement() {
        let coordinator = RefreshCoordinator::new();

        let first = coordinator.refresh(|| async { Ok("a".to_string()) }).await;
        assert_eq!(first.unwrap(), "a");
        assert!(!coordinator.is_refreshing());

        // a later refresh runs again
        let second = coordinator.refresh(|| async { Ok("b".to_string()) }).await;
        assert_eq!(second.unwrap(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_slot_released() {
        let coordinator = RefreshCoordinator::new();
        let failing = || async { Err(ApiError::from_response(401, br#"{"message":"expired"}"#)) };

        let (a, b) = tokio::join!(
            coordinator.refresh(failing),
            coordinator.refresh(|| async { Ok("unused".to_string()) }),
        );

        assert_eq!(a.unwrap_err().message, "expired");
        assert_eq!(b.unwrap_err().message, "expired");
        assert!(!coordinator.is_refreshing());
    }
}
