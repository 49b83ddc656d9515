use serde::{Deserialize, Serialize};

/// Kind of committed mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Put,
    Delete,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Put => "put",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// One committed mutation, the unit of WAL replay.
///
/// `value` is present only for [`EventKind::Put`] and always holds the
/// encoded (encrypted) form of the value. `sequence` is assigned by the log
/// on append and strictly increases through the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    pub key: String,
    pub value: Option<String>,
}

impl Event {
    pub fn put(sequence: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Put,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(sequence: u64, key: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Delete,
            key: key.into(),
            value: None,
        }
    }
}
