use cns_crypto::CryptoError;
use cns_resilience::{ConfigError, ResilienceError};
use cns_store::StoreError;
use cns_wal::WalError;
use thiserror::Error;

/// Where in the service lifecycle a log error happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStage {
    /// Reading events back during setup.
    Replay,
    /// Recording a committed mutation.
    Append,
    /// Closing the log during teardown.
    Close,
}

impl std::fmt::Display for LogStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Replay => "replay",
            Self::Append => "append",
            Self::Close => "close",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(ResilienceError<StoreError>),

    #[error("encryption failed: {0}")]
    Encryption(#[source] CryptoError),

    #[error("decryption failed: {0}")]
    Decryption(#[source] CryptoError),

    #[error("transaction log {stage} failed: {source}")]
    Log {
        stage: LogStage,
        #[source]
        source: WalError,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("service is not ready")]
    NotReady,

    #[error("service is closed")]
    Closed,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ServiceError {
    pub(crate) fn log(stage: LogStage, source: WalError) -> Self {
        Self::Log { stage, source }
    }

    /// Whether the durability guarantee can no longer be trusted.
    ///
    /// True for log failures while replaying or closing; the process should
    /// not keep (or start) serving after one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Log {
                stage: LogStage::Replay | LogStage::Close,
                ..
            }
        )
    }
}

impl From<ResilienceError<StoreError>> for ServiceError {
    fn from(err: ResilienceError<StoreError>) -> Self {
        match err {
            ResilienceError::Operation(StoreError::NotFound(key)) => Self::NotFound(key),
            ResilienceError::Cancelled => Self::Cancelled,
            other => Self::Storage(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn not_found_is_unwrapped_from_pipeline() {
        let err: ServiceError = ResilienceError::Operation(StoreError::NotFound("k".into())).into();
        assert!(matches!(err, ServiceError::NotFound(k) if k == "k"));
    }

    #[test]
    fn pipeline_failures_become_storage_errors() {
        let err: ServiceError = ResilienceError::<StoreError>::CircuitOpen.into();
        assert!(matches!(err, ServiceError::Storage(ResilienceError::CircuitOpen)));

        let err: ServiceError = ResilienceError::<StoreError>::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, ServiceError::Storage(_)));

        let err: ServiceError = ResilienceError::<StoreError>::Cancelled.into();
        assert!(matches!(err, ServiceError::Cancelled));
    }

    #[test]
    fn only_replay_and_close_failures_are_fatal() {
        assert!(ServiceError::log(LogStage::Replay, WalError::AlreadyRead).is_fatal());
        assert!(ServiceError::log(LogStage::Close, WalError::Closed).is_fatal());
        assert!(!ServiceError::log(LogStage::Append, WalError::Closed).is_fatal());
        assert!(!ServiceError::NotFound("k".into()).is_fatal());
    }
}
