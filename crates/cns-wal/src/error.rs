use std::io;

/// Errors produced by the transactional log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// I/O error during WAL or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error at offset {offset}: {message}")]
    Serialization { offset: u64, message: String },

    /// CRC integrity check failed for a complete WAL record.
    #[error("CRC integrity check failed at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// A complete record declares an impossible payload length.
    #[error("invalid WAL entry length {length} at offset {offset}")]
    InvalidEntryLength { offset: u64, length: u32 },

    /// A record's sequence number does not follow its predecessor.
    #[error("sequence out of order at offset {offset}: {found} follows {previous}")]
    SequenceOutOfOrder {
        offset: u64,
        previous: u64,
        found: u64,
    },

    /// A record decoded cleanly but does not describe a valid mutation.
    #[error("malformed event {sequence}: {message}")]
    MalformedEvent { sequence: u64, message: String },

    /// The log has been closed and cannot accept events.
    #[error("transaction log is closed")]
    Closed,

    /// The events of this log have already been read once.
    #[error("transaction log events were already read")]
    AlreadyRead,
}

/// Convenience alias used throughout the WAL crate.
pub type WalResult<T> = std::result::Result<T, WalError>;
