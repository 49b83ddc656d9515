use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{WalError, WalResult};
use crate::event::{Event, EventKind};

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for the Write-Ahead Log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes payload CRC + 4 bytes header CRC.
const HEADER_SIZE: u64 = 12;

/// Largest payload a frame may declare.
const MAX_RECORD: u32 = 64 * 1024 * 1024;

/// Frame one event for disk.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [4 bytes: CRC32 of the 8 bytes above (little-endian u32)]
/// [N bytes: payload (bincode-serialized Event)]
/// ```
///
/// The header checksum makes the declared length trustworthy, so a frame
/// running past the end of the file can be told apart from a damaged length.
pub(crate) fn encode_record(event: &Event, offset: u64) -> WalResult<Vec<u8>> {
    let payload = bincode::serialize(event).map_err(|e| WalError::Serialization {
        offset,
        message: e.to_string(),
    })?;
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_RECORD)
        .ok_or_else(|| WalError::Serialization {
            offset,
            message: format!("record of {} bytes exceeds frame limit", payload.len()),
        })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    let header_crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&header_crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Sequential reader over the records of a WAL file.
///
/// Yields events in file order. A header cut short by the end of the file, or
/// an intact header whose payload runs past it, is a torn write from a crash:
/// iteration stops there without an error. Any other damage (header checksum
/// or length out of bounds, payload CRC mismatch, undecodable payload,
/// non-increasing sequence) is yielded once as an error and ends iteration.
pub struct WalReader {
    reader: BufReader<File>,
    file_len: u64,
    offset: u64,
    last_sequence: Option<u64>,
    records: u64,
    done: bool,
}

impl WalReader {
    /// Open a reader positioned at the start of the file.
    pub fn open(path: &Path) -> WalResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_len,
            offset: 0,
            last_sequence: None,
            records: 0,
            done: false,
        })
    }

    /// Byte offset just past the last valid record read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Sequence number of the last valid record read so far.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Number of valid records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Whether unread bytes remain past the last valid record.
    pub fn has_trailing_bytes(&self) -> bool {
        self.offset < self.file_len
    }

    fn read_next(&mut self) -> WalResult<Option<Event>> {
        if self.offset + HEADER_SIZE > self.file_len {
            if self.offset < self.file_len {
                warn!(
                    offset = self.offset,
                    file_len = self.file_len,
                    "partial WAL header at tail"
                );
            }
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        self.reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let header_crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        if crc32fast::hash(&header[..8]) != header_crc || length == 0 || length > MAX_RECORD {
            return Err(WalError::InvalidEntryLength {
                offset: self.offset,
                length,
            });
        }

        let end = self.offset + HEADER_SIZE + u64::from(length);
        if end > self.file_len {
            warn!(
                offset = self.offset,
                length,
                file_len = self.file_len,
                "partial WAL record at tail"
            );
            return Ok(None);
        }

        let mut payload = vec![0u8; length as usize];
        self.reader.read_exact(&mut payload)?;

        let actual = crc32fast::hash(&payload);
        if actual != expected {
            return Err(WalError::CrcMismatch {
                offset: self.offset,
                expected,
                actual,
            });
        }

        let event: Event =
            bincode::deserialize(&payload).map_err(|e| WalError::Serialization {
                offset: self.offset,
                message: e.to_string(),
            })?;

        if let Some(previous) = self.last_sequence {
            if event.sequence <= previous {
                return Err(WalError::SequenceOutOfOrder {
                    offset: self.offset,
                    previous,
                    found: event.sequence,
                });
            }
        }

        self.last_sequence = Some(event.sequence);
        self.offset = end;
        self.records += 1;
        Ok(Some(event))
    }
}

impl Iterator for WalReader {
    type Item = WalResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Internal mutable state for the WAL writer.
struct WalWriter {
    writer: BufWriter<File>,
    /// Current write offset in the file.
    offset: u64,
    next_sequence: u64,
    closed: bool,
}

/// Crash-recoverable Write-Ahead Log.
///
/// Events are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single file. Opening an existing file
/// scans it once to continue the sequence numbering and to cut off a torn
/// final record left by a crash mid-append.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open (or create) a WAL file at the given path.
    pub fn open(path: &Path, config: WalConfig) -> WalResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut reader = WalReader::open(path)?;
        let mut damaged = false;
        for record in reader.by_ref() {
            if let Err(e) = record {
                warn!(error = %e, "WAL is damaged; replay will report it");
                damaged = true;
            }
        }

        let mut offset = file_len;
        if !damaged && reader.has_trailing_bytes() {
            warn!(
                valid_len = reader.offset(),
                file_len, "truncating torn WAL tail"
            );
            file.set_len(reader.offset())?;
            offset = reader.offset();
        }

        let next_sequence = reader.last_sequence().map_or(1, |s| s + 1);
        info!(
            path = %path.display(),
            records = reader.records(),
            next_sequence,
            "WAL opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                writer: BufWriter::new(file),
                offset,
                next_sequence,
                closed: false,
            }),
            config,
        })
    }

    /// Append one event, assigning it the next sequence number.
    pub fn append(&self, kind: EventKind, key: &str, value: Option<&str>) -> WalResult<Event> {
        let mut w = self.writer.lock();
        if w.closed {
            return Err(WalError::Closed);
        }

        let event = Event {
            sequence: w.next_sequence,
            kind,
            key: key.to_owned(),
            value: value.map(str::to_owned),
        };
        let frame = encode_record(&event, w.offset)?;

        w.writer.write_all(&frame)?;
        w.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }

        let entry_offset = w.offset;
        w.offset += frame.len() as u64;
        w.next_sequence += 1;

        debug!(
            sequence = event.sequence,
            kind = %event.kind,
            offset = entry_offset,
            "WAL append"
        );
        Ok(event)
    }

    /// Read every valid event from the start of the file.
    pub fn recover(&self) -> WalResult<Vec<Event>> {
        let events = WalReader::open(&self.path)?.collect::<WalResult<Vec<_>>>()?;
        debug!(recovered = events.len(), "WAL recovery complete");
        Ok(events)
    }

    /// Open an independent reader over the file.
    pub fn reader(&self) -> WalResult<WalReader> {
        WalReader::open(&self.path)
    }

    /// Flush and fsync, then refuse further appends. Closing twice is a no-op.
    pub fn close(&self) -> WalResult<()> {
        let mut w = self.writer.lock();
        if w.closed {
            debug!("WAL already closed");
            return Ok(());
        }
        w.writer.flush()?;
        w.writer.get_ref().sync_all()?;
        w.closed = true;
        info!(path = %self.path.display(), offset = w.offset, "WAL closed");
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().offset
    }

    /// Sequence number the next append will receive.
    pub fn next_sequence(&self) -> u64 {
        self.writer.lock().next_sequence
    }

    /// Whether [`WriteAheadLog::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.writer.lock().closed
    }

    /// Path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
