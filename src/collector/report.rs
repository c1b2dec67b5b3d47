use crate::pipeline::CommitReport;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Summary of one collection cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: NaiveDateTime,
    pub records_read: usize,
    pub records_decoded: usize,
    /// Records without a recoverable race id
    pub records_dropped: usize,
    pub races: usize,
    pub snapshots: usize,
    pub commit: CommitReport,
    pub next_interval_secs: u64,
}

impl CycleReport {
    pub fn next_interval(&self) -> Duration {
        Duration::from_secs(self.next_interval_secs)
    }
}
