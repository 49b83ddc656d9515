//! Storage port and backends for the cloud-native store.
//!
//! Every backend implements the [`ObjectPort`] trait: a uniform
//! get/put/delete contract over string keys and string values. The object
//! service only ever talks to this trait, so backends are interchangeable.
//!
//! # Storage Backends
//!
//! - [`ShardedStore`] -- in-memory map partitioned across independently
//!   locked shards
//! - [`TableStore`] -- adapter over a remote row-oriented table, reached
//!   through the [`TableClient`] seam
//!
//! # Design Rules
//!
//! 1. A write fully replaces the prior value; there is no versioning.
//! 2. Deleting an absent key is not an error.
//! 3. Reading an absent key fails with [`StoreError::NotFound`].
//! 4. Backends never interpret values; they only ever see encoded tokens.

pub mod error;
pub mod sharded;
pub mod table;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use sharded::ShardedStore;
pub use table::{TableClient, TableConfig, TableStore};
pub use traits::ObjectPort;
