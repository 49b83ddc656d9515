//! Object service for the cloud-native store.
//!
//! [`ObjectService`] ties the other crates together: values are encrypted
//! with a [`cns_crypto::Codec`], stored through a [`cns_store::ObjectPort`]
//! behind per-operation resilience pipelines, and every committed mutation
//! is recorded to an optional [`cns_wal::TransactionLog`] that is replayed by
//! [`ObjectService::setup`] before the service starts serving.
//!
//! # Quick Start
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use cns_crypto::EncryptionKey;
//! use cns_service::ObjectService;
//! use cns_store::ShardedStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let port = Arc::new(ShardedStore::new(NonZeroUsize::new(16).unwrap()));
//! let service = ObjectService::builder(EncryptionKey::generate(), port).build().unwrap();
//! service.setup().await.unwrap();
//!
//! let ctx = CancellationToken::new();
//! service.put(&ctx, "user:1", "alice").await.unwrap();
//! assert_eq!(service.get(&ctx, "user:1").await.unwrap(), "alice");
//! # });
//! ```

pub mod error;
pub mod service;

pub use error::{LogStage, ServiceError, ServiceResult};
pub use service::{ObjectService, ObjectServiceBuilder, Phase};
