//! Fixed-width record builder
//!
//! Produces space-padded Shift_JIS payloads with text placed at byte offsets. Used to
//! synthesize records for replay files, benchmarks and tests.

use super::layout::{ANNOUNCED_AT_RANGE, RACE_ID_RANGE};
use super::types::{RawRecord, Source};
use encoding_rs::SHIFT_JIS;

/// Builds one fixed-width record
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    buf: Vec<u8>,
}

impl RecordBuilder {
    /// Blank record of `len` bytes with the kind code in bytes 0..2
    pub fn new(kind: &str, len: usize) -> Self {
        let mut builder = Self {
            buf: vec![b' '; len.max(2)],
        };
        builder.put(0, kind);
        builder
    }

    /// Write `text` (Shift_JIS encoded) starting at byte `offset`, growing the buffer if needed
    pub fn put(&mut self, offset: usize, text: &str) -> &mut Self {
        let (bytes, _, _) = SHIFT_JIS.encode(text);
        let end = offset + bytes.len();
        if self.buf.len() < end {
            self.buf.resize(end, b' ');
        }
        self.buf[offset..end].copy_from_slice(&bytes);
        self
    }

    /// Write a zero-padded number into a field of `width` bytes
    pub fn put_num(&mut self, offset: usize, width: usize, value: u64) -> &mut Self {
        let text = format!("{:0width$}", value, width = width);
        self.put(offset, &text)
    }

    pub fn race_id(&mut self, race_id: &str) -> &mut Self {
        self.put(RACE_ID_RANGE.0, race_id)
    }

    pub fn announced_at(&mut self, mmddhhmm: &str) -> &mut Self {
        self.put(ANNOUNCED_AT_RANGE.0, mmddhhmm)
    }

    /// Drop everything from byte `len` onward
    pub fn truncate(&mut self, len: usize) -> &mut Self {
        self.buf.truncate(len);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn build(&self, source: Source) -> RawRecord {
        RawRecord::new(source, self.buf.clone())
    }
}
