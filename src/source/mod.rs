//! Record source module
//!
//! The vendor link sits behind [`RecordSource`]; [`collect_batch`] drains it into raw records

mod keys;
mod replay;
mod types;

pub use keys::{RealtimeKeys, DEFAULT_DATA_SPECS};
pub use replay::ReplaySource;
pub use types::{
    BatchLimits, ReadOutcome, SourceError, SourceRequest, READ_EOF, READ_FILE_SWITCH,
};

use crate::record::{RawRecord, Source};
use async_trait::async_trait;

/// Open/read/close protocol of a raw record feed
#[async_trait]
pub trait RecordSource: Send {
    /// Which organization the records come from
    fn source(&self) -> Source;

    /// Start reading `spec` for `key`; a negative status means no data
    async fn open(&mut self, spec: &str, key: &str) -> Result<i32, SourceError>;

    /// Next record: positive code with payload, 0 at end, -1 on file switch, below -1 on error
    async fn read(&mut self) -> Result<ReadOutcome, SourceError>;

    async fn close(&mut self);
}

/// Drain every request into one batch of raw records.
///
/// Failures are confined to their key: it contributes whatever was read before the
/// failure and the batch moves on.
pub async fn collect_batch(
    source: &mut dyn RecordSource,
    requests: &[SourceRequest],
    limits: BatchLimits,
) -> Vec<RawRecord> {
    let mut batch = Vec::new();
    for request in requests {
        match source.open(&request.spec, &request.key).await {
            Ok(status) if status < 0 => {
                tracing::trace!(spec = %request.spec, key = %request.key, status, "No data for key");
                source.close().await;
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(spec = %request.spec, key = %request.key, error = %e, "Open failed");
                source.close().await;
                continue;
            }
        }

        let read = drain(source, &mut batch, limits).await;
        source.close().await;
        tracing::debug!(spec = %request.spec, key = %request.key, records = read, "Key drained");
    }
    batch
}

async fn drain(
    source: &mut dyn RecordSource,
    batch: &mut Vec<RawRecord>,
    limits: BatchLimits,
) -> usize {
    let kind = source.source();
    let mut read = 0;
    let mut empty_reads = 0;

    loop {
        let outcome = match source.read().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Read failed");
                break;
            }
        };

        match outcome.code {
            code if code > 0 => {
                empty_reads = 0;
                batch.push(RawRecord::new(kind, outcome.payload));
                read += 1;
                if read >= limits.max_records_per_key {
                    tracing::warn!(read, "Per-key record limit reached");
                    break;
                }
            }
            READ_EOF => break,
            READ_FILE_SWITCH => {
                empty_reads += 1;
                if empty_reads >= limits.max_empty_reads {
                    tracing::warn!(empty_reads, "Too many consecutive empty reads");
                    break;
                }
            }
            code => {
                tracing::warn!(error = %SourceError::Read(code), "Read error status");
                break;
            }
        }
    }
    read
}
