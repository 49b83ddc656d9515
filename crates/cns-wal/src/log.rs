use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{WalError, WalResult};
use crate::event::{Event, EventKind};
use crate::wal::{WalConfig, WriteAheadLog};

/// Buffered events between the file reader thread and the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The two halves of a one-shot log read.
///
/// `events` yields every committed event in log order and then closes.
/// `errors` carries at most one read fault; when a fault occurs no further
/// events follow it. Both channels are closed once reading ends.
pub struct EventStream {
    pub events: mpsc::Receiver<Event>,
    pub errors: mpsc::Receiver<WalError>,
}

/// Durable record of committed mutations.
///
/// Writes are issued only after the storage backend accepted the mutation.
pub trait TransactionLog: Send + Sync {
    /// Append a put of the (already encoded) `value` under `key`.
    fn write_put(&self, key: &str, value: &str) -> WalResult<()>;

    /// Append a delete of `key`.
    fn write_delete(&self, key: &str) -> WalResult<()>;

    /// Stream every previously committed event, exactly once per log.
    fn read_events(&self) -> EventStream;

    /// Flush and release the log. Called once at shutdown.
    fn close(&self) -> WalResult<()>;
}

/// [`TransactionLog`] backed by a [`WriteAheadLog`] file.
pub struct FileTransactionLog {
    wal: Arc<WriteAheadLog>,
    read: AtomicBool,
}

impl FileTransactionLog {
    /// Open (or create) the log file at `path`.
    pub fn open(path: &Path, config: WalConfig) -> WalResult<Self> {
        Ok(Self {
            wal: Arc::new(WriteAheadLog::open(path, config)?),
            read: AtomicBool::new(false),
        })
    }

    /// The underlying write-ahead log.
    pub fn wal(&self) -> &WriteAheadLog {
        &self.wal
    }
}

impl TransactionLog for FileTransactionLog {
    fn write_put(&self, key: &str, value: &str) -> WalResult<()> {
        self.wal.append(EventKind::Put, key, Some(value)).map(drop)
    }

    fn write_delete(&self, key: &str) -> WalResult<()> {
        self.wal.append(EventKind::Delete, key, None).map(drop)
    }

    fn read_events(&self) -> EventStream {
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, errors) = mpsc::channel(1);

        if self.read.swap(true, Ordering::SeqCst) {
            // Capacity is 1 and the channel is fresh, so this cannot fail.
            let _ = error_tx.try_send(WalError::AlreadyRead);
            return EventStream { events, errors };
        }

        let wal = Arc::clone(&self.wal);
        thread::spawn(move || {
            let reader = match wal.reader() {
                Ok(reader) => reader,
                Err(e) => {
                    let _ = error_tx.blocking_send(e);
                    return;
                }
            };

            let mut sent = 0u64;
            for record in reader {
                match record {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            debug!("event receiver dropped; stopping log read");
                            return;
                        }
                        sent += 1;
                    }
                    Err(e) => {
                        let _ = error_tx.blocking_send(e);
                        return;
                    }
                }
            }
            info!(events = sent, "transaction log read complete");
        });

        EventStream { events, errors }
    }

    fn close(&self) -> WalResult<()> {
        self.wal.close()
    }
}
