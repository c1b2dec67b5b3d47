//! Race snapshot types

use crate::features::{EntityFeatures, OddsType};
use crate::record::{DecodedRecord, Source};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Bucket name of the mutable, most-recent snapshot
pub const LATEST_BUCKET: &str = "latest";

/// Time slot a snapshot belongs to
///
/// Announced buckets sort before `Latest`, and among themselves in MMDDHHMM order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// Odds announcement time (MMDDHHMM); contents never change once observed
    Announced(String),
    /// Current state of the race, overwritten as it changes
    Latest,
}

impl Bucket {
    pub fn as_str(&self) -> &str {
        match self {
            Bucket::Announced(ts) => ts,
            Bucket::Latest => LATEST_BUCKET,
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Bucket::Latest)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Everything observed for one race in one bucket during a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub race_id: String,
    pub source: Source,
    pub bucket: Bucket,
    /// Decoded records by record type, in arrival order
    pub records: BTreeMap<String, Vec<DecodedRecord>>,
    /// Temporal features derived from the odds records
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<OddsType, Vec<EntityFeatures>>,
}

impl RaceSnapshot {
    pub fn new(race_id: impl Into<String>, source: Source, bucket: Bucket) -> Self {
        Self {
            race_id: race_id.into(),
            source,
            bucket,
            records: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, record: DecodedRecord) {
        self.records
            .entry(record.record_type().to_string())
            .or_default()
            .push(record);
    }

    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn all_records(&self) -> impl Iterator<Item = &DecodedRecord> {
        self.records.values().flatten()
    }
}

/// Snapshots of a cycle: race id → bucket → snapshot
pub type SnapshotMap = BTreeMap<String, BTreeMap<Bucket, RaceSnapshot>>;

/// Iterate every snapshot in race, then bucket order
pub fn iter_snapshots(map: &SnapshotMap) -> impl Iterator<Item = &RaceSnapshot> {
    map.values().flat_map(|buckets| buckets.values())
}

pub fn snapshot_count(map: &SnapshotMap) -> usize {
    map.values().map(BTreeMap::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_ordering() {
        let early = Bucket::Announced("06151400".into());
        let late = Bucket::Announced("06151432".into());
        assert!(early < late);
        assert!(late < Bucket::Latest);
    }

    #[test]
    fn test_bucket_display_and_serde() {
        assert_eq!(Bucket::Latest.to_string(), "latest");
        assert_eq!(
            serde_json::to_string(&Bucket::Announced("06151432".into())).unwrap(),
            "\"06151432\""
        );
        assert!(Bucket::Latest.is_latest());
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = RaceSnapshot::new("2024061505030211", Source::Jra, Bucket::Latest);
        assert_eq!(snap.record_count(), 0);
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("features").is_none());
        assert_eq!(json["bucket"], "latest");
    }
}
