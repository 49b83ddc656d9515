use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::call::{terminal, BoxCall, Classifier, Middleware, Request, Shareable};
use crate::config::ResilienceConfig;
use crate::error::CallResult;
use crate::stages::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStage, Debounce, Retry, Timeout};

/// An ordered stack of middleware wrapped around a single-key operation.
///
/// Stages are applied in order, each wrapping everything applied before it,
/// so the first stage sits closest to the operation and the last one sees
/// whole calls. The stack is composed once when the pipeline is built; stage
/// state such as breaker counters therefore lives as long as the pipeline
/// and is shared by every [`Pipeline::call`].
pub struct Pipeline<T, E> {
    call: BoxCall<T, E>,
    stages: Vec<&'static str>,
    breaker: Option<CircuitBreaker>,
}

impl<T: Shareable, E: Shareable + fmt::Display> Pipeline<T, E> {
    pub fn builder() -> PipelineBuilder<T, E> {
        PipelineBuilder::new()
    }

    /// The standard stack: timeout, debounce, retry, circuit breaker, applied
    /// in that order.
    ///
    /// The timeout bounds a single attempt, duplicate attempts are coalesced,
    /// retry re-runs timed-out or transiently failed attempts, and the breaker
    /// counts whole calls, rejecting them once `breaker_threshold` calls in a
    /// row have failed.
    ///
    /// `name` labels the breaker in logs. `classifier` decides which operation
    /// errors are transient.
    pub fn standard(name: &'static str, config: &ResilienceConfig, classifier: Classifier<E>) -> Self {
        let breaker = CircuitBreaker::new(
            name,
            CircuitBreakerConfig {
                failure_threshold: config.breaker_threshold,
                cooldown: config.breaker_cooldown(),
                half_open_successes: config.half_open_successes,
            },
        );
        Self::builder()
            .stage(Timeout::new(config.timeout()))
            .stage(Debounce::new(config.debounce_window()))
            .stage(Retry::new(config.max_attempts, config.backoff(), Arc::clone(&classifier)))
            .breaker(breaker, classifier)
            .build()
    }
}

impl<T, E> Pipeline<T, E> {
    /// Run `req` through every stage.
    pub async fn call(&self, req: Request<T, E>) -> CallResult<T, E> {
        (self.call)(req).await
    }

    /// Stage names in application order, innermost first.
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }

    /// The pipeline's circuit breaker, when it has one.
    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }
}

impl<T, E> fmt::Debug for Pipeline<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .field("breaker", &self.breaker.as_ref().map(|b| b.state()))
            .finish()
    }
}

/// Collects stages in application order, innermost first.
pub struct PipelineBuilder<T, E> {
    stages: Vec<Box<dyn Middleware<T, E>>>,
    breaker: Option<CircuitBreaker>,
}

impl<T: Shareable, E: Shareable> PipelineBuilder<T, E> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            breaker: None,
        }
    }

    /// Wrap a stage around the ones already added.
    pub fn stage(mut self, stage: impl Middleware<T, E> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Wrap a circuit-breaker stage around the ones already added and keep a
    /// handle to its breaker.
    pub fn breaker(mut self, breaker: CircuitBreaker, classifier: Classifier<E>) -> Self {
        self.breaker = Some(breaker.clone());
        self.stages.push(Box::new(CircuitBreakerStage::new(breaker, classifier)));
        self
    }

    pub fn build(self) -> Pipeline<T, E> {
        let names: Vec<&'static str> = self.stages.iter().map(|s| s.name()).collect();
        let call = self
            .stages
            .iter()
            .fold(terminal(), |inner, stage| stage.wrap(inner));
        debug!(stages = ?names, "resilience pipeline built");
        Pipeline {
            call,
            stages: names,
            breaker: self.breaker,
        }
    }
}

impl<T: Shareable, E: Shareable> Default for PipelineBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
