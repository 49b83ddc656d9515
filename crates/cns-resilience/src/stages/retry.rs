use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::debug;

use crate::call::{BoxCall, Classifier, Middleware, Request, Shareable};
use crate::error::ResilienceError;

/// Re-invokes the inner call on transient operation failures.
///
/// At most `max_attempts` calls are made in total, `backoff` apart. A timed-out
/// attempt is retried like a transient operation error. Errors the classifier
/// rejects, and other pipeline errors such as an open breaker, are returned
/// at once. The caller's cancellation token is checked before each
/// attempt and during each backoff.
pub struct Retry<E> {
    max_attempts: u32,
    backoff: Duration,
    classifier: Classifier<E>,
}

impl<E> Retry<E> {
    pub fn new(max_attempts: u32, backoff: Duration, classifier: Classifier<E>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            classifier,
        }
    }
}

impl<T: Shareable, E: Shareable + std::fmt::Display> Middleware<T, E> for Retry<E> {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn wrap(&self, inner: BoxCall<T, E>) -> BoxCall<T, E> {
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;
        let classifier = Arc::clone(&self.classifier);
        Arc::new(move |req: Request<T, E>| {
            let inner = Arc::clone(&inner);
            let classifier = Arc::clone(&classifier);
            async move {
                let cancel = req.cancel_token().clone();
                let mut attempt = 1;
                loop {
                    if cancel.is_cancelled() {
                        return Err(ResilienceError::Cancelled);
                    }
                    match inner(req.clone()).await {
                        Ok(value) => {
                            if attempt > 1 {
                                debug!(key = req.key(), attempt, "call succeeded after retry");
                            }
                            return Ok(value);
                        }
                        Err(err) if attempt < max_attempts && err.is_transient(&*classifier) => {
                            debug!(
                                key = req.key(),
                                attempt,
                                max_attempts,
                                delay_ms = backoff.as_millis() as u64,
                                error = %err,
                                "transient error, retrying after backoff",
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                            }
                            attempt += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            .boxed()
        })
    }
}
