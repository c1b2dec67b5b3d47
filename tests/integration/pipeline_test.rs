//! Upload pipeline integration tests

use chrono::NaiveDate;
use keiba_ingest::features::TemporalFeatureEngine;
use keiba_ingest::pipeline::{
    DedupUploadPipeline, LedgerRotation, LocalStore, MemoryStore, PipelineConfig, UploadLedger,
};
use keiba_ingest::record::{RawRecord, RecordBuilder, RecordDecoder, Source};
use keiba_ingest::snapshot::{SnapshotAssembler, SnapshotMap};
use std::sync::Arc;
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn odds_record(race: &str, announced: &str, odds: &[u64]) -> RawRecord {
    let mut b = RecordBuilder::new("O1", 300);
    b.race_id(race).announced_at(announced);
    b.put_num(35, 2, odds.len() as u64);
    for (i, o) in odds.iter().enumerate() {
        let base = 43 + i * 8;
        b.put_num(base, 2, (i + 1) as u64)
            .put_num(base + 2, 4, *o)
            .put_num(base + 6, 2, (i + 1) as u64);
    }
    b.build(Source::Jra)
}

fn snapshots(raw: &[RawRecord]) -> SnapshotMap {
    let decoder = RecordDecoder::default();
    let mut map = SnapshotAssembler::new().assemble(raw.iter().filter_map(|r| decoder.decode(r)));
    TemporalFeatureEngine::in_memory().enrich_all(&mut map);
    map
}

#[tokio::test]
async fn test_local_store_layout_and_ledger_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("out");
    let ledger_path = dir.path().join("state/ledger.json");

    let map = snapshots(&[
        odds_record("2024061505030211", "06151420", &[20, 35]),
        odds_record("2024061505030211", "06151425", &[21, 33]),
        odds_record("2024061509030212", "06151425", &[18]),
    ]);

    let ledger = UploadLedger::open(Some(ledger_path.clone()), LedgerRotation::Daily, today());
    let mut pipeline = DedupUploadPipeline::new(
        Arc::new(LocalStore::new(&root)),
        ledger,
        PipelineConfig::default(),
    );
    let report = pipeline.commit(&map).await;
    assert_eq!(report.committed.len(), 3);
    assert_eq!(report.failed, 0);

    let written = root.join("timeseries/jra/20240615/2024061505030211/06151425.json");
    let body: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&written).unwrap()).unwrap();
    assert_eq!(body["race_id"], "2024061505030211");
    assert_eq!(body["bucket"], "06151425");
    assert_eq!(body["records"]["O1"][0]["win_odds"]["1"]["odds"].as_f64(), Some(2.1));

    let stored: Vec<String> =
        serde_json::from_slice(&std::fs::read(&ledger_path).unwrap()).unwrap();
    assert_eq!(stored.len(), 3);

    // A restarted pipeline skips everything already recorded
    let reopened = UploadLedger::open(Some(ledger_path), LedgerRotation::Daily, today());
    let mut restarted = DedupUploadPipeline::new(
        Arc::new(LocalStore::new(&root)),
        reopened,
        PipelineConfig::default(),
    );
    let report = restarted.commit(&map).await;
    assert!(report.committed.is_empty());
    assert_eq!(report.skipped, 3);
}

#[tokio::test]
async fn test_partial_failure_is_isolated_and_retried() {
    let store = Arc::new(MemoryStore::new());
    store.fail_prefix("timeseries/jra/20240615/2024061509").await;

    let map = snapshots(&[
        odds_record("2024061505030211", "06151420", &[20]),
        odds_record("2024061509030212", "06151420", &[18]),
    ]);
    let mut pipeline = DedupUploadPipeline::new(
        store.clone(),
        UploadLedger::in_memory(),
        PipelineConfig {
            concurrency: 2,
            ..Default::default()
        },
    );

    let first = pipeline.commit(&map).await;
    assert_eq!(first.committed.len(), 1);
    assert_eq!(first.failed, 1);
    assert!(!pipeline
        .ledger()
        .contains("timeseries/jra/20240615/2024061509030212/06151420.json"));

    store.clear_failures().await;
    let second = pipeline.commit(&map).await;
    assert_eq!(second.skipped, 1);
    assert_eq!(second.failed, 0);
    assert!(second
        .committed
        .contains("timeseries/jra/20240615/2024061509030212/06151420.json"));
    assert_eq!(store.write_count().await, 2);
}

#[tokio::test]
async fn test_custom_prefixes() {
    let store = Arc::new(MemoryStore::new());
    let mut pipeline = DedupUploadPipeline::new(
        store.clone(),
        UploadLedger::in_memory(),
        PipelineConfig {
            concurrency: 4,
            history_prefix: "ts".to_string(),
            latest_prefix: "now".to_string(),
        },
    );

    let mut b = RecordBuilder::new("WE", 60);
    b.race_id("2024061505030211");
    let map = snapshots(&[
        odds_record("2024061505030211", "06151420", &[20]),
        b.build(Source::Jra),
    ]);
    pipeline.commit(&map).await;

    let mut writes = store.writes().await;
    writes.sort();
    assert_eq!(
        writes,
        vec![
            "now/jra/20240615/2024061505030211/latest.json".to_string(),
            "ts/jra/20240615/2024061505030211/06151420.json".to_string(),
        ]
    );
}
