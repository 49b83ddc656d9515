use std::collections::HashMap;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectPort;

/// A single independently locked partition of the keyspace.
type Shard = RwLock<HashMap<String, String>>;

/// In-memory object store partitioned across a fixed number of shards.
///
/// A key is routed to shard `hash(key) mod N` where the hash is the first
/// eight bytes of its BLAKE3 digest, so routing is stable for the lifetime of
/// the store (and across processes). Writers lock only their shard; readers
/// take the shard's shared lock.
pub struct ShardedStore {
    shards: Box<[Shard]>,
}

impl ShardedStore {
    /// Create a store with `shard_count` empty shards.
    pub fn new(shard_count: NonZeroUsize) -> Self {
        let shards = (0..shard_count.get())
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        tracing::debug!(shards = shard_count.get(), "sharded store created");
        Self { shards }
    }

    /// Number of shards, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`.
    pub fn shard_index(&self, key: &str) -> usize {
        let digest = blake3::hash(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.shards.len() as u64) as usize
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Insert or overwrite `key`.
    pub fn insert(&self, key: &str, value: &str) {
        self.shard(key)
            .write()
            .insert(key.to_owned(), value.to_owned());
    }

    /// Look up `key`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.shard(key).read().get(key).cloned()
    }

    /// Remove `key`, returning `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.shard(key).write().remove(key).is_some()
    }

    /// Total number of keys across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Returns `true` if no shard holds any key.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }
}

#[async_trait]
impl ObjectPort for ShardedStore {
    async fn get(&self, key: &str) -> StoreResult<String> {
        self.lookup(key)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shard_count", &self.shard_count())
            .field("key_count", &self.len())
            .finish()
    }
}
