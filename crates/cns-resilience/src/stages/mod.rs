//! Built-in pipeline stages.

pub mod breaker;
pub mod debounce;
pub mod retry;
pub mod timeout;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerStage, CircuitState};
pub use debounce::Debounce;
pub use retry::Retry;
pub use timeout::Timeout;
