use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{CallResult, ResilienceError};

/// Bounds required of values and errors flowing through a pipeline.
///
/// Debounced callers share one result, so both sides must be cloneable and
/// shareable across tasks.
pub trait Shareable: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Shareable for T {}

/// The innermost unit of work: one attempt of a single-key operation.
pub type Operation<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Decides whether an operation error is transient (worth retrying and
/// counting against the circuit breaker).
pub type Classifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A composed pipeline layer: takes a request, yields its eventual result.
pub type BoxCall<T, E> = Arc<dyn Fn(Request<T, E>) -> BoxFuture<'static, CallResult<T, E>> + Send + Sync>;

/// One call travelling through the pipeline.
///
/// `digest` identifies the call for debouncing: two requests with equal
/// digests are considered identical. It covers the key and the caller's
/// payload bytes, so concurrent writes of different values never coalesce.
pub struct Request<T, E> {
    key: String,
    digest: [u8; 32],
    cancel: CancellationToken,
    operation: Operation<T, E>,
}

impl<T, E> Request<T, E> {
    pub fn new(key: impl Into<String>, payload: &[u8], operation: Operation<T, E>) -> Self {
        let key = key.into();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update(payload);
        Self {
            key,
            digest: *hasher.finalize().as_bytes(),
            cancel: CancellationToken::new(),
            operation,
        }
    }

    /// Attach the caller's cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start one attempt of the wrapped operation.
    pub fn run(&self) -> BoxFuture<'static, Result<T, E>> {
        (self.operation)()
    }
}

impl<T, E> Clone for Request<T, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            digest: self.digest,
            cancel: self.cancel.clone(),
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<T, E> fmt::Debug for Request<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("key", &self.key)
            .field("digest", &hex_prefix(&self.digest))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn hex_prefix(digest: &[u8; 32]) -> String {
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// One resilience stage.
///
/// A middleware wraps the next (inner) call and returns a new call. Any state
/// it keeps (breaker counters, in-flight tables) belongs to the middleware
/// value and is shared by every call made through the wrapped result.
pub trait Middleware<T, E>: Send + Sync {
    /// Human-readable stage name, used in logs and for pipeline inspection.
    fn name(&self) -> &'static str;

    fn wrap(&self, inner: BoxCall<T, E>) -> BoxCall<T, E>;
}

/// The innermost call of every pipeline: run one attempt of the operation.
pub(crate) fn terminal<T: Shareable, E: Shareable>() -> BoxCall<T, E> {
    Arc::new(|req: Request<T, E>| {
        let attempt = req.run();
        async move { attempt.await.map_err(ResilienceError::Operation) }.boxed()
    })
}
