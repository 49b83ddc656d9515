use std::time::Duration;

/// Errors surfaced by a resilience pipeline.
///
/// `E` is the error type of the wrapped operation; it is carried unchanged in
/// [`ResilienceError::Operation`] so callers can still inspect it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResilienceError<E> {
    /// The call did not complete within the configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The circuit breaker is open and the call was rejected without running.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The caller cancelled the call between retry attempts.
    #[error("operation cancelled")]
    Cancelled,

    /// The pipeline itself failed (e.g. the spawned call panicked).
    #[error("pipeline error: {0}")]
    Internal(String),

    /// The wrapped operation failed.
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    /// The wrapped operation's error, if that is what failed.
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the failure is worth another attempt and counts against a
    /// circuit breaker: always for a timed-out attempt, and for an operation
    /// error when `classifier` accepts it.
    pub fn is_transient(&self, classifier: impl Fn(&E) -> bool) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Operation(e) => classifier(e),
            _ => false,
        }
    }
}

/// Result of running a call through a pipeline.
pub type CallResult<T, E> = std::result::Result<T, ResilienceError<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_is_exposed() {
        let err: ResilienceError<String> = ResilienceError::Operation("disk full".into());
        assert_eq!(err.operation().map(String::as_str), Some("disk full"));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn pipeline_errors_carry_no_operation_error() {
        let err: ResilienceError<String> = ResilienceError::Timeout(Duration::from_secs(5));
        assert!(err.operation().is_none());
        assert_eq!(err.to_string(), "operation timed out after 5s");
        assert!(ResilienceError::<String>::CircuitOpen.operation().is_none());
    }

    #[test]
    fn timeouts_are_always_transient() {
        let never = |_: &String| false;
        assert!(ResilienceError::<String>::Timeout(Duration::from_secs(5)).is_transient(never));
        assert!(!ResilienceError::Operation("missing".to_string()).is_transient(never));
        assert!(ResilienceError::Operation("down".to_string()).is_transient(|e: &String| e == "down"));
        assert!(!ResilienceError::<String>::CircuitOpen.is_transient(|_: &String| true));
        assert!(!ResilienceError::<String>::Cancelled.is_transient(|_: &String| true));
    }
}
