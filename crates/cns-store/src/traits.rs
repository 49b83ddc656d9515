use async_trait::async_trait;

use crate::error::StoreResult;

/// Storage port: the get/put/delete contract every backend satisfies.
///
/// All implementations must satisfy these invariants:
/// - `put` inserts or fully overwrites the value for `key`.
/// - `get` returns the last value put for `key`, or `StoreError::NotFound`.
/// - `delete` removes `key`; deleting an absent key succeeds.
/// - Calls may arrive concurrently from many tasks.
#[async_trait]
pub trait ObjectPort: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<String>;

    /// Insert or overwrite the value stored under `key`.
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key` if present.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
