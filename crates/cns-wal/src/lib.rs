//! Transactional log for the cloud-native store.
//!
//! Every committed mutation is appended as an [`Event`] to a CRC-framed
//! [`WriteAheadLog`]. On startup the log is read back once, in order, through
//! the [`TransactionLog::read_events`] channel pair so the object service can
//! rebuild its in-memory state before serving traffic.

pub mod error;
pub mod event;
pub mod log;
pub mod wal;

pub use error::{WalError, WalResult};
pub use event::{Event, EventKind};
pub use log::{EventStream, FileTransactionLog, TransactionLog};
pub use wal::{SyncMode, WalConfig, WalReader, WriteAheadLog};
