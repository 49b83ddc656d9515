//! Circuit breaker for failing storage backends.
//!
//! ```text
//! ┌────────┐  failure_threshold  ┌──────┐     cooldown      ┌──────────┐
//! │ Closed │ ──────reached─────→ │ Open │ ────elapsed─────→ │ HalfOpen │
//! └────────┘                     └──────┘ ←──probe fails─── └──────────┘
//!      ↑                                                         │
//!      └─────────────── half_open_successes met ─────────────────┘
//! ```
//!
//! The breaker belongs to the pipeline, not to a call: every call made
//! through one wrapped pipeline shares the same counters.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::call::{BoxCall, Classifier, Middleware, Request, Shareable};
use crate::error::ResilienceError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// All calls pass through.
    Closed,
    /// Calls are rejected until `until`.
    Open { until: Instant },
    /// Calls pass through as probes of the backend.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open { .. } => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub half_open_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            half_open_successes: 1,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    config: CircuitBreakerConfig,
    state_transitions: u64,
    fast_fail_count: u64,
}

/// A snapshot of circuit breaker counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub state_transitions: u64,
    pub fast_fail_count: u64,
}

/// Thread-safe consecutive-failure circuit breaker.
///
/// Cloning yields a handle to the same breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                config,
                state_transitions: 0,
                fast_fail_count: 0,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a call may proceed. An open breaker whose cool-down has
    /// elapsed moves to half-open and lets the call through as a probe.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open { until } => {
                if Instant::now() >= until {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.state_transitions += 1;
                    info!(breaker = self.name, "circuit breaker half-open, probing backend");
                    true
                } else {
                    inner.fast_fail_count += 1;
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= inner.config.half_open_successes {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.state_transitions += 1;
                    info!(breaker = self.name, "circuit breaker closed after successful probes");
                }
            }
            // A call admitted before the breaker opened; it does not reset it.
            CircuitState::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= inner.config.failure_threshold {
                    inner.state = CircuitState::Open {
                        until: Instant::now() + inner.config.cooldown,
                    };
                    inner.state_transitions += 1;
                    warn!(
                        breaker = self.name,
                        failures = inner.consecutive_failures,
                        cooldown_ms = inner.config.cooldown.as_millis() as u64,
                        "circuit breaker opened",
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open {
                    until: Instant::now() + inner.config.cooldown,
                };
                inner.half_open_successes = 0;
                inner.state_transitions += 1;
                warn!(breaker = self.name, "probe failed, circuit breaker re-opened");
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            state_transitions: inner.state_transitions,
            fast_fail_count: inner.fast_fail_count,
        }
    }
}

/// Pipeline stage guarding the inner call with a [`CircuitBreaker`].
///
/// Timeouts and operation errors the classifier marks transient count as
/// failures. A permanent operation error (such as a missing key) proves the
/// backend answered and counts as a success. Other pipeline errors leave the
/// counters alone.
pub struct CircuitBreakerStage<E> {
    breaker: CircuitBreaker,
    classifier: Classifier<E>,
}

impl<E> CircuitBreakerStage<E> {
    pub fn new(breaker: CircuitBreaker, classifier: Classifier<E>) -> Self {
        Self {
            breaker,
            classifier,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<T: Shareable, E: Shareable> Middleware<T, E> for CircuitBreakerStage<E> {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn wrap(&self, inner: BoxCall<T, E>) -> BoxCall<T, E> {
        let breaker = self.breaker.clone();
        let classifier = Arc::clone(&self.classifier);
        Arc::new(move |req: Request<T, E>| {
            if !breaker.allow_request() {
                return async { Err(ResilienceError::CircuitOpen) }.boxed();
            }
            let breaker = breaker.clone();
            let classifier = Arc::clone(&classifier);
            let call = inner(req);
            async move {
                let result = call.await;
                match &result {
                    Ok(_) => breaker.record_success(),
                    Err(err) if err.is_transient(&*classifier) => breaker.record_failure(),
                    Err(ResilienceError::Operation(_)) => breaker.record_success(),
                    Err(_) => {}
                }
                result
            }
            .boxed()
        })
    }
}
