//! Replays recorded raw records through the open/read/close protocol

use super::types::{ReadOutcome, SourceError};
use super::RecordSource;
use crate::record::Source;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;

/// One queued read result
#[derive(Debug, Clone)]
enum Entry {
    Record(Vec<u8>),
    FileSwitch,
}

/// Serves queued records to the next `open`, then reports no data until more are pushed
///
/// Replay files hold one record per line in the vendor's Shift_JIS encoding; a blank
/// line marks a file switch.
#[derive(Debug)]
pub struct ReplaySource {
    source: Source,
    pending: VecDeque<Entry>,
    reading: VecDeque<Entry>,
    opened: Option<String>,
}

impl ReplaySource {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
            reading: VecDeque::new(),
            opened: None,
        }
    }

    /// Queue text records, encoding them as Shift_JIS
    pub fn from_lines<'a>(source: Source, lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut replay = Self::new(source);
        for line in lines {
            if line.is_empty() {
                replay.push_file_switch();
            } else {
                let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(line);
                replay.push(bytes.into_owned());
            }
        }
        replay
    }

    /// Load a recorded replay file
    pub async fn from_file(source: Source, path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SourceError::Replay {
                path: path.display().to_string(),
                source,
            })?;

        let mut replay = Self::new(source);
        for line in bytes.split(|b| *b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                replay.push_file_switch();
            } else {
                replay.push(line.to_vec());
            }
        }
        // A trailing newline is not a file switch
        if matches!(replay.pending.back(), Some(Entry::FileSwitch)) {
            replay.pending.pop_back();
        }

        tracing::info!(
            path = %path.display(),
            records = replay.queued(),
            "Loaded replay file"
        );
        Ok(replay)
    }

    pub fn push(&mut self, payload: Vec<u8>) {
        self.pending.push_back(Entry::Record(payload));
    }

    pub fn push_file_switch(&mut self) {
        self.pending.push_back(Entry::FileSwitch);
    }

    /// Records waiting for the next `open`
    pub fn queued(&self) -> usize {
        self.pending
            .iter()
            .filter(|e| matches!(e, Entry::Record(_)))
            .count()
    }
}

#[async_trait]
impl RecordSource for ReplaySource {
    fn source(&self) -> Source {
        self.source
    }

    async fn open(&mut self, spec: &str, key: &str) -> Result<i32, SourceError> {
        if self.pending.is_empty() {
            return Ok(-1);
        }
        let count = self.queued();
        self.reading = std::mem::take(&mut self.pending);
        self.opened = Some(format!("{}/{}", spec, key));
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        if self.opened.is_none() {
            return Err(SourceError::Unavailable("read before open".to_string()));
        }
        Ok(match self.reading.pop_front() {
            Some(Entry::Record(payload)) => ReadOutcome::record(payload),
            Some(Entry::FileSwitch) => ReadOutcome::file_switch(),
            None => ReadOutcome::eof(),
        })
    }

    async fn close(&mut self) {
        self.opened = None;
        self.reading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_consumes_batch_once() {
        let mut replay = ReplaySource::from_lines(Source::Jra, ["O1a", "RAb"]);
        assert_eq!(replay.open("0B14", "k1").await.unwrap(), 2);
        assert_eq!(replay.read().await.unwrap().payload, b"O1a");
        assert_eq!(replay.read().await.unwrap().payload, b"RAb");
        assert_eq!(replay.read().await.unwrap().code, 0);
        replay.close().await;

        assert_eq!(replay.open("0B14", "k2").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut replay = ReplaySource::new(Source::Nar);
        assert!(replay.read().await.is_err());
    }

    #[tokio::test]
    async fn test_from_file_splits_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.txt");
        std::fs::write(&path, b"O1first\r\n\nRAsecond\n").unwrap();

        let mut replay = ReplaySource::from_file(Source::Jra, &path).await.unwrap();
        assert_eq!(replay.queued(), 2);
        replay.open("0B14", "k").await.unwrap();
        assert_eq!(replay.read().await.unwrap().payload, b"O1first");
        assert_eq!(replay.read().await.unwrap().code, -1);
        assert_eq!(replay.read().await.unwrap().payload, b"RAsecond");
        assert_eq!(replay.read().await.unwrap().code, 0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = ReplaySource::from_file(Source::Jra, "/nonexistent/replay.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Replay { .. }));
    }
}
