//! Request deduplication
//!
//! Identical requests issued while one is already in flight share its
//! outcome instead of hitting the network again. The request runs as a
//! spawned task, so it completes even if every caller stops waiting, and its
//! registry entry lingers for one window after it settles to absorb
//! near-simultaneous duplicates.

use crate::error::{ApiError, ApiResult};
use crate::types::{Envelope, Method};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

type SharedResult<T> = Shared<BoxFuture<'static, ApiResult<T>>>;

struct PendingRequest<T> {
    id: u64,
    started_at: Instant,
    future: SharedResult<T>,
}

/// Collapses identical concurrent requests into one
pub struct Deduplicator<T = Envelope> {
    pending: Arc<Mutex<HashMap<String, PendingRequest<T>>>>,
    window: Duration,
    next_id: AtomicU64,
}

impl<T> Deduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a deduplicator with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            window,
            next_id: AtomicU64::new(0),
        }
    }

    /// Dedup window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Signature of a request: `<METHOD>:<url>:<payload-json>`
    ///
    /// A missing payload serializes as `{}`.
    pub fn key<P: Serialize + ?Sized>(method: Method, url: &str, payload: Option<&P>) -> String {
        let payload = payload
            .and_then(|p| serde_json::to_string(p).ok())
            .filter(|p| p != "null")
            .unwrap_or_else(|| "{}".to_string());
        format!("{method}:{url}:{payload}")
    }

    /// Run `request_fn` unless an identical request started within the window
    ///
    /// Late callers get the outcome of the request already in flight,
    /// including its error.
    pub async fn deduplicate<F, Fut>(&self, key: &str, request_fn: F) -> ApiResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let future = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(existing) if existing.started_at.elapsed() < self.window => {
                    debug!(key, "Joining in-flight request");
                    existing.future.clone()
                }
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.launch(key.to_string(), id, request_fn());
                    pending.insert(
                        key.to_string(),
                        PendingRequest {
                            id,
                            started_at: Instant::now(),
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        future.await
    }

    /// Number of registered requests, settled or not
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Forget every registered request. In-flight tasks still complete.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }

    fn launch<Fut>(&self, key: String, id: u64, request: Fut) -> SharedResult<T>
    where
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let registry = Arc::clone(&self.pending);
        let window = self.window;

        let handle = tokio::spawn(async move {
            let result = request.await;
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let mut pending = registry.lock();
                // a newer request may have taken over the key
                if pending.get(&key).is_some_and(|p| p.id == id) {
                    pending.remove(&key);
                    trace!(key, "Released dedup entry");
                }
            });
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ApiError::transport(format!("Request task failed: {e}"))))
        }
        .boxed()
        .shared()
    }
}

impl<T> std::fmt::Debug for Deduplicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("pending", &self.pending.lock().len())
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod dedup_tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn dedup() -> Deduplicator<u32> {
        Deduplicator::new(Duration::from_millis(1000))
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_key_format() {
        let body = json!({"name": "widget"});
        assert_eq!(
            Deduplicator::<u32>::key(Method::POST, "/items", Some(&body)),
            r#"POST:/items:{"name":"widget"}"#
        );
        assert_eq!(
            Deduplicator::<u32>::key::<serde_json::Value>(Method::GET, "/items", None),
            "GET:/items:{}"
        );
        assert_eq!(
            Deduplicator::<u32>::key(Method::PUT, "/items/1", Some(&serde_json::Value::Null)),
            "PUT:/items/1:{}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_execution() {
        let dedup = dedup();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(7)
            }
        };

        let (a, b, c) = tokio::join!(
            dedup.deduplicate("k", make()),
            dedup.deduplicate("k", make()),
            dedup.deduplicate("k", make()),
        );

        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (7, 7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callers_share_rejection() {
        let dedup = dedup();
        let failing = || async { Err(ApiError::from_response(503, br#"{"message":"down"}"#)) };

        let (a, b) = tokio::join!(
            dedup.deduplicate("k", failing),
            dedup.deduplicate("k", || async { Ok(1) }),
        );

        let a = a.unwrap_err();
        let b = b.unwrap_err();
        assert_eq!(a, b);
        assert_eq!(a.message, "down");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_entry_absorbs_duplicates_within_window() {
        let dedup = dedup();
        assert_eq!(dedup.deduplicate("k", || async { Ok(1) }).await.unwrap(), 1);

        // settled, but still inside the window
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(dedup.deduplicate("k", || async { Ok(2) }).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_removed_one_window_after_settlement() {
        let dedup = dedup();
        dedup.deduplicate("k", || async { Ok(1) }).await.unwrap();
        assert_eq!(dedup.len(), 1);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        settle().await;
        assert!(dedup.is_empty());

        assert_eq!(dedup.deduplicate("k", || async { Ok(2) }).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_replaced() {
        let dedup = dedup();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        };
        let pending = dedup.deduplicate("k", slow);
        let fresh = async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            dedup.deduplicate("k", || async { Ok(2) }).await
        };

        let (pending, fresh) = tokio::join!(pending, fresh);
        assert_eq!(pending.unwrap(), 1);
        // the first request was older than the window, so a new one ran
        assert_eq!(fresh.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_collapse() {
        let dedup = dedup();
        let (a, b) = tokio::join!(
            dedup.deduplicate("a", || async { Ok(1) }),
            dedup.deduplicate("b", || async { Ok(2) }),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_still_completes() {
        let dedup = dedup();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let abandoned = dedup.deduplicate("k", move || async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });
        // poll once so the request is registered, then drop it
        let _ = futures::poll!(Box::pin(abandoned));

        tokio::time::sleep(Duration::from_millis(20)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_forgets_entries() {
        let dedup = dedup();
        dedup.deduplicate("k", || async { Ok(1) }).await.unwrap();
        dedup.clear();
        assert!(dedup.is_empty());
    }
}
