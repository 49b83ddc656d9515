//! Resilience pipeline for the cloud-native store.
//!
//! Every storage call made by the object service runs through a
//! [`Pipeline`]: an ordered stack of [`Middleware`] stages composed once and
//! reused for every call. The standard stack applies [`Timeout`] →
//! [`Debounce`] → [`Retry`] → [`CircuitBreakerStage`], each stage wrapping the
//! ones before it: the timeout bounds one attempt and the breaker sees whole
//! calls.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use futures_util::FutureExt;
//! use cns_resilience::{Operation, Pipeline, Request, ResilienceConfig};
//!
//! # tokio_test_block(async {
//! let pipeline: Pipeline<String, String> =
//!     Pipeline::standard("get", &ResilienceConfig::default(), Arc::new(|_: &String| true));
//! let op: Operation<String, String> = Arc::new(|| async { Ok("value".to_string()) }.boxed());
//! let value = pipeline.call(Request::new("user:1", b"", op)).await.unwrap();
//! assert_eq!(value, "value");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stages;

pub use call::{BoxCall, Classifier, Middleware, Operation, Request, Shareable};
pub use config::{ConfigError, ResilienceConfig};
pub use error::{CallResult, ResilienceError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use stages::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerStage, CircuitState, Debounce, Retry,
    Timeout,
};
