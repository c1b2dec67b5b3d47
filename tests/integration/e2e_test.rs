//! End-to-end integration tests

use chrono::{NaiveDate, NaiveDateTime};
use keiba_ingest::collector::{Collector, RequestPlan};
use keiba_ingest::config::Config;
use keiba_ingest::features::{OddsType, TemporalFeatureEngine};
use keiba_ingest::pipeline::{
    DedupUploadPipeline, LedgerRotation, MemoryStore, PipelineConfig, UploadLedger,
};
use keiba_ingest::record::{RawRecord, RecordBuilder, Source};
use keiba_ingest::scheduler::AdaptiveScheduler;
use keiba_ingest::snapshot::Bucket;
use keiba_ingest::source::ReplaySource;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

const RACE: &str = "2024061501010101";

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// O1 record without an announcement time, three runners at 1.5 / 3.0 / 4.5
fn win_odds_record() -> Vec<u8> {
    let mut b = RecordBuilder::new("O1", 300);
    b.race_id(RACE);
    b.put_num(35, 2, 3);
    for (i, odds) in [45u64, 15, 30].iter().enumerate() {
        let base = 43 + i * 8;
        b.put_num(base, 2, (i + 1) as u64);
        b.put_num(base + 2, 4, *odds);
        b.put_num(base + 6, 2, 0);
    }
    b.bytes().to_vec()
}

fn race_info_record(start: &str) -> Vec<u8> {
    let mut b = RecordBuilder::new("RA", 1000);
    b.race_id(RACE).put(873, start);
    b.bytes().to_vec()
}

fn collector(store: Arc<MemoryStore>, records: Vec<Vec<u8>>) -> Collector {
    let mut replay = ReplaySource::new(Source::Jra);
    for record in records {
        replay.push(record);
    }
    Collector::new(
        Box::new(replay),
        RequestPlan::default(),
        TemporalFeatureEngine::in_memory(),
        DedupUploadPipeline::new(store, UploadLedger::in_memory(), PipelineConfig::default()),
        AdaptiveScheduler::default(),
    )
}

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.source.kind, Source::Jra);
    assert_eq!(config.pipeline.concurrency, 10);
    assert_eq!(config.scheduler.long_interval_secs, 300);
}

#[test]
fn test_odds_and_info_share_latest_bucket() {
    let c = collector(Arc::new(MemoryStore::new()), vec![]);
    let raw = vec![
        RawRecord::new(Source::Jra, win_odds_record()),
        RawRecord::new(Source::Jra, race_info_record("1530")),
    ];
    let snapshots = c.preview(&raw);

    assert_eq!(snapshots.len(), 1);
    let buckets = &snapshots[RACE];
    assert_eq!(buckets.len(), 1);
    let snapshot = &buckets[&Bucket::Latest];
    assert_eq!(snapshot.records["O1"].len(), 1);
    assert_eq!(snapshot.records["RA"].len(), 1);
}

#[tokio::test]
async fn test_full_cycle_far_from_post_time() {
    let store = Arc::new(MemoryStore::new());
    let mut c = collector(
        store.clone(),
        vec![win_odds_record(), race_info_record("1530")],
    );

    let report = c.run_cycle(at(9, 0)).await;
    assert_eq!(report.records_read, 2);
    assert_eq!(report.races, 1);
    assert_eq!(report.snapshots, 1);
    assert_eq!(report.next_interval(), Duration::from_secs(300));

    let path = format!("latest/jra/20240615/{RACE}/latest.json");
    assert_eq!(store.writes().await, vec![path.clone()]);

    let body: serde_json::Value =
        serde_json::from_slice(&store.object(&path).await.unwrap()).unwrap();
    let win = body["features"]["O1"].as_array().unwrap();
    let keys: Vec<_> = win.iter().map(|f| f["entity_key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["2", "3", "1"]);
    assert_eq!(win[0]["odds_gap_ratio"].as_f64(), Some(1.0));
    assert_eq!(win[1]["odds_gap_ratio"].as_f64(), Some(2.0));
    assert_eq!(win[1]["is_odds_gap"].as_u64(), Some(1));
    assert_eq!(win[2]["odds_gap_ratio"].as_f64(), Some(1.5));
    assert_eq!(win[2]["is_odds_gap"].as_u64(), Some(1));
    assert_eq!(win[0]["prob_diff"].as_f64(), Some(0.0));
    assert_eq!(body["records"]["RA"][0]["start_time_hhmm"], "1530");

    let history = &c.engine().history()[RACE][&OddsType::O1];
    assert_eq!(history["2"].last_odds, dec!(1.5));
}

#[tokio::test]
async fn test_cycle_near_post_time_polls_fast() {
    let store = Arc::new(MemoryStore::new());
    let mut c = collector(store, vec![win_odds_record(), race_info_record("1530")]);
    let report = c.run_cycle(at(15, 20)).await;
    assert_eq!(report.next_interval(), Duration::from_secs(30));
}

#[tokio::test]
async fn test_restart_does_not_rewrite_unchanged_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let ledger_path = dir.path().join("ledger.json");
    let store = Arc::new(MemoryStore::new());

    for cycle in 0..2 {
        let mut replay = ReplaySource::new(Source::Jra);
        replay.push(race_info_record("1530"));
        let ledger = UploadLedger::open(
            Some(ledger_path.clone()),
            LedgerRotation::Daily,
            at(9, 0).date(),
        );
        let mut c = Collector::new(
            Box::new(replay),
            RequestPlan::default(),
            TemporalFeatureEngine::in_memory(),
            DedupUploadPipeline::new(store.clone(), ledger, PipelineConfig::default()),
            AdaptiveScheduler::default(),
        );
        let report = c.run_cycle(at(9, cycle)).await;
        assert_eq!(report.commit.skipped, cycle as usize);
    }
    assert_eq!(store.write_count().await, 1);
}
