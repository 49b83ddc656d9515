use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::warn;

use crate::call::{BoxCall, Middleware, Request, Shareable};
use crate::error::ResilienceError;

/// Stops waiting for the inner call after a fixed deadline.
///
/// The inner call runs on its own task, so when the deadline passes it keeps
/// running to completion in the background; only the caller gives up.
#[derive(Clone, Debug)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<T: Shareable, E: Shareable> Middleware<T, E> for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn wrap(&self, inner: BoxCall<T, E>) -> BoxCall<T, E> {
        let duration = self.duration;
        Arc::new(move |req: Request<T, E>| {
            let key = req.key().to_owned();
            let handle = tokio::spawn(inner(req));
            async move {
                match tokio::time::timeout(duration, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join)) => Err(ResilienceError::Internal(join.to_string())),
                    Err(_) => {
                        warn!(key = %key, timeout_ms = duration.as_millis() as u64, "call timed out");
                        Err(ResilienceError::Timeout(duration))
                    }
                }
            }
            .boxed()
        })
    }
}
