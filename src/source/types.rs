use thiserror::Error;

/// Read status: no more data for the current key
pub const READ_EOF: i32 = 0;

/// Read status: the vendor switched to the next file, keep reading
pub const READ_FILE_SWITCH: i32 = -1;

/// Record source failures. A failed key contributes nothing to the cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("open {spec}/{key} failed with status {status}")]
    Open { spec: String, key: String, status: i32 },
    #[error("read failed with status {0}")]
    Read(i32),
    #[error("replay file {path}: {source}")]
    Replay {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// One `read()` result: a positive code carries a record in `payload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub code: i32,
    pub payload: Vec<u8>,
}

impl ReadOutcome {
    pub fn record(payload: Vec<u8>) -> Self {
        Self {
            code: i32::try_from(payload.len()).unwrap_or(i32::MAX),
            payload,
        }
    }

    pub fn eof() -> Self {
        Self {
            code: READ_EOF,
            payload: Vec::new(),
        }
    }

    pub fn file_switch() -> Self {
        Self {
            code: READ_FILE_SWITCH,
            payload: Vec::new(),
        }
    }
}

/// A `(data spec, key)` pair to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub spec: String,
    pub key: String,
}

impl SourceRequest {
    pub fn new(spec: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            key: key.into(),
        }
    }
}

/// Limits applied while draining one key
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// Consecutive file-switch reads tolerated before giving up on a key
    pub max_empty_reads: usize,
    /// Records taken from one key before moving on
    pub max_records_per_key: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_empty_reads: 1000,
            max_records_per_key: 100_000,
        }
    }
}
