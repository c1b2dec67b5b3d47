//! Adaptive polling scheduler
//!
//! Picks the delay before the next cycle from the post times seen in the current
//! snapshots: short while any race is about to start, long otherwise.

use crate::snapshot::{iter_snapshots, SnapshotMap};
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use std::time::Duration;

/// Polling cadence and the window that counts as "imminent"
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub short_interval: Duration,
    pub long_interval: Duration,
    /// How long after post time a race still counts as imminent
    pub lookback: ChronoDuration,
    /// How far ahead of post time a race counts as imminent
    pub lookahead: ChronoDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            short_interval: Duration::from_secs(30),
            long_interval: Duration::from_secs(300),
            lookback: ChronoDuration::minutes(5),
            lookahead: ChronoDuration::minutes(15),
        }
    }
}

/// Stateless; every decision is a function of the snapshots and the clock
#[derive(Debug, Clone, Default)]
pub struct AdaptiveScheduler {
    config: SchedulerConfig,
}

impl AdaptiveScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Delay before the next cycle
    pub fn next_interval(&self, snapshots: &SnapshotMap, now: NaiveDateTime) -> Duration {
        if self.imminent_race(snapshots, now).is_some() {
            self.config.short_interval
        } else {
            self.config.long_interval
        }
    }

    /// First race whose post time lies in `[now - lookback, now + lookahead]`
    pub fn imminent_race<'a>(&self, snapshots: &'a SnapshotMap, now: NaiveDateTime) -> Option<&'a str> {
        let earliest = now - self.config.lookback;
        let latest = now + self.config.lookahead;

        iter_snapshots(snapshots)
            .flat_map(|snapshot| snapshot.all_records())
            .filter_map(|record| {
                let hhmm = record.start_time_hhmm()?;
                let time = parse_hhmm(hhmm)?;
                Some((record.race_id(), now.date().and_time(time)))
            })
            .find(|(_, start)| *start >= earliest && *start <= latest)
            .map(|(race_id, start)| {
                tracing::debug!(race_id, start = %start, "Race is imminent");
                race_id
            })
    }
}

/// `HHMM` to a time of day; anything else is rejected
pub fn parse_hhmm(text: &str) -> Option<NaiveTime> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = text[0..2].parse().ok()?;
    let minute = text[2..4].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DecodedRecord, FieldMap, FieldValue, InfoRecord, Source};
    use crate::snapshot::SnapshotAssembler;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn race_with_start(start: &str) -> SnapshotMap {
        let mut fields = FieldMap::new();
        fields.insert("start_time_hhmm".into(), FieldValue::Text(start.into()));
        SnapshotAssembler::new().assemble(vec![DecodedRecord::Info(InfoRecord {
            record_type: "RA".into(),
            source: Source::Jra,
            race_id: "2024061505030211".into(),
            fields,
            horse_weights: vec![],
        })])
    }

    #[test]
    fn test_window_boundaries() {
        let scheduler = AdaptiveScheduler::default();
        let snaps = race_with_start("1530");
        let short = Duration::from_secs(30);
        let long = Duration::from_secs(300);

        assert_eq!(scheduler.next_interval(&snaps, at(15, 15)), short);
        assert_eq!(scheduler.next_interval(&snaps, at(15, 14)), long);
        assert_eq!(scheduler.next_interval(&snaps, at(15, 35)), short);
        assert_eq!(scheduler.next_interval(&snaps, at(15, 36)), long);
        assert_eq!(scheduler.next_interval(&snaps, at(15, 30)), short);
    }

    #[test]
    fn test_malformed_start_times_skipped() {
        let scheduler = AdaptiveScheduler::default();
        for bad in ["", "15:3", "2561", "1575", "abcd", "15300"] {
            let snaps = race_with_start(bad);
            assert_eq!(
                scheduler.next_interval(&snaps, at(15, 30)),
                Duration::from_secs(300),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_empty_snapshots_use_long_interval() {
        let scheduler = AdaptiveScheduler::default();
        assert_eq!(
            scheduler.next_interval(&SnapshotMap::new(), at(12, 0)),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_configured_window() {
        let scheduler = AdaptiveScheduler::new(SchedulerConfig {
            short_interval: Duration::from_secs(10),
            lookahead: ChronoDuration::minutes(60),
            ..Default::default()
        });
        let snaps = race_with_start("1530");
        assert_eq!(scheduler.next_interval(&snaps, at(14, 45)), Duration::from_secs(10));
        assert_eq!(
            scheduler.imminent_race(&snaps, at(14, 45)),
            Some("2024061505030211")
        );
    }

    #[test]
    fn test_lookback_covers_started_races_only() {
        let scheduler = AdaptiveScheduler::new(SchedulerConfig {
            lookback: ChronoDuration::minutes(30),
            lookahead: ChronoDuration::zero(),
            ..Default::default()
        });
        let snaps = race_with_start("1530");
        // 20 minutes after post time
        assert_eq!(scheduler.next_interval(&snaps, at(15, 50)), Duration::from_secs(30));
        // 10 minutes before post time
        assert_eq!(scheduler.next_interval(&snaps, at(15, 20)), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("0905"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_hhmm("2400"), None);
        assert_eq!(parse_hhmm("930"), None);
    }
}
