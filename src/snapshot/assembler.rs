//! Groups decoded records into per-race, per-bucket snapshots

use super::types::{Bucket, RaceSnapshot, SnapshotMap};
use crate::record::DecodedRecord;

/// Stateless per-cycle grouping of decoded records
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotAssembler;

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Announced timestamp for odds records carrying an all-digit one, `Latest` otherwise
    pub fn bucket_for(record: &DecodedRecord) -> Bucket {
        match record.announced_at() {
            Some(ts) if !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()) => {
                Bucket::Announced(ts.to_string())
            }
            _ => Bucket::Latest,
        }
    }

    /// Merge records into snapshots. Records are appended in order; nothing is deduplicated.
    pub fn assemble(&self, records: impl IntoIterator<Item = DecodedRecord>) -> SnapshotMap {
        let mut map = SnapshotMap::new();
        for record in records {
            if record.race_id().is_empty() {
                continue;
            }
            let bucket = Self::bucket_for(&record);
            let snapshot = map
                .entry(record.race_id().to_string())
                .or_default()
                .entry(bucket.clone())
                .or_insert_with(|| RaceSnapshot::new(record.race_id(), record.source(), bucket));
            snapshot.push(record);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FallbackRecord, FieldMap, InfoRecord, OddsRecord, Source};
    use std::collections::BTreeMap;

    const RACE: &str = "2024061505030211";

    fn info(kind: &str, race_id: &str) -> DecodedRecord {
        DecodedRecord::Info(InfoRecord {
            record_type: kind.to_string(),
            source: Source::Jra,
            race_id: race_id.to_string(),
            fields: FieldMap::new(),
            horse_weights: vec![],
        })
    }

    fn odds(kind: &str, announced_at: Option<&str>) -> DecodedRecord {
        DecodedRecord::Odds(OddsRecord {
            record_type: kind.to_string(),
            source: Source::Jra,
            race_id: RACE.to_string(),
            place_code: "05".into(),
            race_num: "11".into(),
            announced_at: announced_at.map(str::to_string),
            win_odds: BTreeMap::new(),
            show_odds: BTreeMap::new(),
            bracket_odds: BTreeMap::new(),
            quinella_odds: BTreeMap::new(),
        })
    }

    #[test]
    fn test_same_type_appends_in_order() {
        let map = SnapshotAssembler::new().assemble(vec![
            info("SE", RACE),
            info("SE", RACE),
            info("RA", RACE),
            info("SE", RACE),
        ]);
        let snap = &map[RACE][&Bucket::Latest];
        assert_eq!(snap.records["SE"].len(), 3);
        assert_eq!(snap.records["RA"].len(), 1);
        assert_eq!(snap.record_count(), 4);
    }

    #[test]
    fn test_odds_records_bucket_by_announcement() {
        let map = SnapshotAssembler::new().assemble(vec![
            odds("O1", Some("06151430")),
            odds("O2", Some("06151430")),
            odds("O1", Some("06151432")),
            info("WE", RACE),
        ]);
        let buckets = &map[RACE];
        assert_eq!(buckets.len(), 3);
        let first = &buckets[&Bucket::Announced("06151430".into())];
        assert_eq!(first.records.keys().collect::<Vec<_>>(), vec!["O1", "O2"]);
        assert!(buckets[&Bucket::Latest].records.contains_key("WE"));
    }

    #[test]
    fn test_odds_without_timestamp_goes_to_latest() {
        let map = SnapshotAssembler::new().assemble(vec![odds("O1", None), info("RA", RACE)]);
        let buckets = &map[RACE];
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&Bucket::Latest].records.len(), 2);
    }

    #[test]
    fn test_races_are_separate() {
        let other = "2024061505030212";
        let map = SnapshotAssembler::new().assemble(vec![
            info("RA", RACE),
            info("RA", other),
            DecodedRecord::Fallback(FallbackRecord {
                record_type: "O3".into(),
                source: Source::Jra,
                race_id: other.into(),
                raw_payload: String::new(),
            }),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map[other][&Bucket::Latest].records.len(), 2);
    }

    #[test]
    fn test_empty_race_id_is_skipped() {
        let map = SnapshotAssembler::new().assemble(vec![info("RA", "")]);
        assert!(map.is_empty());
    }
}
