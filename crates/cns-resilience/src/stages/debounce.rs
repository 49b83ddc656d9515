use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::call::{BoxCall, Middleware, Request, Shareable};
use crate::error::{CallResult, ResilienceError};

type SharedCall<T, E> = Shared<BoxFuture<'static, CallResult<T, E>>>;

struct InFlight<T, E> {
    id: u64,
    started: Instant,
    call: SharedCall<T, E>,
}

struct DedupState<T, E> {
    next_id: u64,
    calls: HashMap<[u8; 32], InFlight<T, E>>,
}

/// Coalesces identical calls issued within a short window.
///
/// A call whose request digest matches one that started less than `window`
/// ago, and is still outstanding, awaits that call's result instead of
/// running the inner chain again. A joined caller still honours its own
/// cancellation token; the shared call keeps running for the others.
pub struct Debounce<T, E> {
    window: Duration,
    state: Arc<Mutex<DedupState<T, E>>>,
}

impl<T, E> Debounce<T, E> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(DedupState {
                next_id: 0,
                calls: HashMap::new(),
            })),
        }
    }

    /// Number of calls currently joinable.
    pub fn in_flight(&self) -> usize {
        self.state.lock().calls.len()
    }
}

impl<T: Shareable, E: Shareable> Middleware<T, E> for Debounce<T, E> {
    fn name(&self) -> &'static str {
        "debounce"
    }

    fn wrap(&self, inner: BoxCall<T, E>) -> BoxCall<T, E> {
        let window = self.window;
        let state = Arc::clone(&self.state);
        Arc::new(move |req: Request<T, E>| {
            let digest = *req.digest();
            let now = Instant::now();

            let mut guard = state.lock();
            guard
                .calls
                .retain(|_, in_flight| now.duration_since(in_flight.started) < window);

            if let Some(in_flight) = guard.calls.get(&digest) {
                debug!(key = req.key(), "joining in-flight call");
                let joined = in_flight.call.clone();
                let cancel = req.cancel_token().clone();
                return async move {
                    tokio::select! {
                        result = joined => result,
                        _ = cancel.cancelled() => Err(ResilienceError::Cancelled),
                    }
                }
                .boxed();
            }

            let id = guard.next_id;
            guard.next_id += 1;
            let call = inner(req).shared();
            guard.calls.insert(
                digest,
                InFlight {
                    id,
                    started: now,
                    call: call.clone(),
                },
            );
            drop(guard);

            let state = Arc::clone(&state);
            async move {
                let result = call.await;
                let mut guard = state.lock();
                if guard.calls.get(&digest).is_some_and(|f| f.id == id) {
                    guard.calls.remove(&digest);
                }
                result
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::call::{terminal, Operation};

    fn slow_counter(calls: Arc<AtomicU32>, delay: Duration) -> Operation<u32, String> {
        Arc::new(move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(n)
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn identical_concurrent_calls_share_one_execution() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = slow_counter(Arc::clone(&calls), Duration::from_millis(50));
        let debounce = Debounce::new(Duration::from_millis(100));
        let call = debounce.wrap(terminal());

        let first = call(Request::new("k", b"v", Arc::clone(&op)));
        let second = call(Request::new("k", b"v", Arc::clone(&op)));
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(debounce.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn joined_caller_can_cancel_without_affecting_the_leader() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = slow_counter(Arc::clone(&calls), Duration::from_millis(50));
        let call = Debounce::new(Duration::from_millis(100)).wrap(terminal());

        let leader = tokio::spawn(call(Request::new("k", b"v", Arc::clone(&op))));
        tokio::task::yield_now().await;

        let cancel = CancellationToken::new();
        let joiner = tokio::spawn(call(
            Request::new("k", b"v", Arc::clone(&op)).with_cancel(cancel.clone()),
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        assert_eq!(joiner.await.unwrap(), Err(ResilienceError::Cancelled));
        assert_eq!(leader.await.unwrap(), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_payloads_are_not_coalesced() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = slow_counter(Arc::clone(&calls), Duration::from_millis(50));
        let call = Debounce::new(Duration::from_millis(100)).wrap(terminal());

        let (a, b) = tokio::join!(
            call(Request::new("k", b"v1", Arc::clone(&op))),
            call(Request::new("k", b"v2", Arc::clone(&op))),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn call_after_window_runs_again() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = slow_counter(Arc::clone(&calls), Duration::from_millis(500));
        let call = Debounce::new(Duration::from_millis(100)).wrap(terminal());

        let first = tokio::spawn(call(Request::new("k", b"", Arc::clone(&op))));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = call(Request::new("k", b"", Arc::clone(&op))).await;

        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_call_is_not_reused() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = slow_counter(Arc::clone(&calls), Duration::from_millis(1));
        let call = Debounce::new(Duration::from_millis(100)).wrap(terminal());

        assert_eq!(call(Request::new("k", b"", Arc::clone(&op))).await, Ok(1));
        assert_eq!(call(Request::new("k", b"", Arc::clone(&op))).await, Ok(2));
    }
}
