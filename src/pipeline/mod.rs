//! Deduplicating upload pipeline
//!
//! Commits snapshots to object storage at most once per cache key

mod ledger;
mod storage;
mod upload;

pub use ledger::{LedgerRotation, UploadLedger};
pub use storage::{
    CommitError, GcsConfig, GcsStore, LocalStore, MemoryStore, ObjectStore, DEFAULT_GCS_BUCKET,
    GCS_API_URL,
};
pub use upload::{canonical_json, sha256_hex, CommitReport, DedupUploadPipeline, PipelineConfig};
