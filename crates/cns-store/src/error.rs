/// Errors from storage port operations.
///
/// `Clone` so a single backend failure can be handed to every caller that
/// was coalesced onto the same in-flight request.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("key does not exist: {0}")]
    NotFound(String),

    /// The backend could not be reached; the call may succeed if retried.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call could plausibly succeed.
    ///
    /// A missing key is an answer, not a failure, so it is never transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(!StoreError::NotFound("k".into()).is_transient());
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(StoreError::Backend("boom".into()).is_transient());
    }
}
