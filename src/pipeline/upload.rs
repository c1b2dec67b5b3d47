//! Deduplicating upload pipeline
//!
//! Decides which snapshots are new, writes them with bounded concurrency and records
//! each confirmed write in the ledger. Historical (announced) buckets are keyed by
//! path alone; the mutable `latest` bucket is keyed by path plus content hash, so it
//! is rewritten only when its content changes.

use super::ledger::UploadLedger;
use super::storage::{CommitError, ObjectStore};
use crate::snapshot::{iter_snapshots, RaceSnapshot, SnapshotMap};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum writes in flight
    pub concurrency: usize,
    /// Path prefix for announced (immutable) buckets
    pub history_prefix: String,
    /// Path prefix for the `latest` bucket
    pub latest_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            history_prefix: "timeseries".to_string(),
            latest_prefix: "latest".to_string(),
        }
    }
}

/// Outcome of one commit call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Paths written and recorded this call
    pub committed: BTreeSet<String>,
    /// Snapshots whose cache key was already in the ledger
    pub skipped: usize,
    /// Snapshots that could not be serialized or written
    pub failed: usize,
}

/// A snapshot ready to be written
#[derive(Debug)]
struct UploadJob {
    path: String,
    cache_key: String,
    body: Vec<u8>,
}

/// Sole owner of the [`UploadLedger`]
pub struct DedupUploadPipeline {
    store: Arc<dyn ObjectStore>,
    ledger: UploadLedger,
    config: PipelineConfig,
}

impl DedupUploadPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, ledger: UploadLedger, config: PipelineConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut UploadLedger {
        &mut self.ledger
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// `<prefix>/<source>/<date>/<race_id>/<bucket>.json`, date taken from the race id
    pub fn destination_path(&self, snapshot: &RaceSnapshot) -> String {
        let prefix = if snapshot.bucket.is_latest() {
            &self.config.latest_prefix
        } else {
            &self.config.history_prefix
        };
        let date = snapshot
            .race_id
            .get(0..8)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or("unknown");
        format!(
            "{}/{}/{}/{}/{}.json",
            prefix,
            snapshot.source.path_segment(),
            date,
            snapshot.race_id,
            snapshot.bucket
        )
    }

    /// Path for announced buckets; path plus content hash for `latest`
    pub fn cache_key(snapshot: &RaceSnapshot, path: &str, body: &[u8]) -> String {
        if snapshot.bucket.is_latest() {
            format!("{}#{}", path, sha256_hex(body))
        } else {
            path.to_string()
        }
    }

    fn prepare(&self, snapshot: &RaceSnapshot) -> Result<UploadJob, CommitError> {
        let path = self.destination_path(snapshot);
        let body = canonical_json(snapshot).map_err(|source| CommitError::Serialize {
            path: path.clone(),
            source,
        })?;
        let cache_key = Self::cache_key(snapshot, &path, &body);
        Ok(UploadJob {
            path,
            cache_key,
            body,
        })
    }

    /// Write every snapshot not already in the ledger.
    ///
    /// Returns once all writes have finished. Failed writes stay out of the ledger and
    /// are retried by the next call that sees the same snapshot.
    pub async fn commit(&mut self, snapshots: &SnapshotMap) -> CommitReport {
        let mut report = CommitReport::default();
        let mut jobs = Vec::new();

        for snapshot in iter_snapshots(snapshots) {
            match self.prepare(snapshot) {
                Ok(job) if self.ledger.contains(&job.cache_key) => {
                    tracing::trace!(path = %job.path, "Already committed");
                    report.skipped += 1;
                }
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to prepare snapshot");
                    report.failed += 1;
                }
            }
        }

        if jobs.is_empty() {
            return report;
        }

        let store = Arc::clone(&self.store);
        let mut results = stream::iter(jobs)
            .map(|job| {
                let store = Arc::clone(&store);
                async move {
                    let result = store.put(&job.path, job.body).await;
                    (job.path, job.cache_key, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((path, cache_key, result)) = results.next().await {
            match result {
                Ok(()) => {
                    if let Err(e) = self.ledger.record(cache_key) {
                        tracing::warn!(path = %path, error = %e, "Upload ledger not persisted");
                    }
                    report.committed.insert(path);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot commit failed, will retry next cycle");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            committed = report.committed.len(),
            skipped = report.skipped,
            failed = report.failed,
            store = %self.store.describe(),
            "Commit finished"
        );
        report
    }
}

/// JSON with object keys in sorted order (serde_json's `Map` is ordered by key)
pub fn canonical_json(snapshot: &RaceSnapshot) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(snapshot)?;
    serde_json::to_vec(&value)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
