//! Snapshot assembly module
//!
//! Groups a cycle's decoded records by race and observation time

mod assembler;
mod types;

pub use assembler::SnapshotAssembler;
pub use types::{iter_snapshots, snapshot_count, Bucket, RaceSnapshot, SnapshotMap, LATEST_BUCKET};
