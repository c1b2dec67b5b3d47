//! Cycle runner
//!
//! One cycle drains the record source, decodes, assembles snapshots, derives features,
//! commits new snapshots and picks the delay before the next cycle. Cycles run
//! back to back on one task; nothing inside a cycle is allowed to stop the loop.

mod report;

pub use report::CycleReport;

use crate::config::{Config, StorageBackend};
use crate::features::TemporalFeatureEngine;
use crate::pipeline::{
    DedupUploadPipeline, GcsStore, LocalStore, MemoryStore, ObjectStore, UploadLedger,
};
use crate::record::{RawRecord, RecordDecoder};
use crate::scheduler::AdaptiveScheduler;
use crate::snapshot::{snapshot_count, SnapshotAssembler, SnapshotMap};
use crate::source::{
    collect_batch, BatchLimits, RealtimeKeys, RecordSource, ReplaySource, SourceRequest,
};
use crate::store::FlushPolicy;
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Which `(spec, key)` pairs are opened each cycle
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub data_specs: Vec<String>,
    pub place_codes: u8,
    pub races_per_place: u8,
    pub limits: BatchLimits,
}

impl RequestPlan {
    /// Every data spec crossed with the day's realtime keys
    pub fn requests(&self, date: NaiveDate) -> Vec<SourceRequest> {
        RealtimeKeys::for_date(date, self.place_codes, self.races_per_place)
            .requests(&self.data_specs)
    }
}

impl Default for RequestPlan {
    fn default() -> Self {
        Self {
            data_specs: vec!["0B14".to_string()],
            place_codes: 1,
            races_per_place: 1,
            limits: BatchLimits::default(),
        }
    }
}

pub struct Collector {
    source: Box<dyn RecordSource>,
    plan: RequestPlan,
    decoder: RecordDecoder,
    assembler: SnapshotAssembler,
    engine: TemporalFeatureEngine,
    pipeline: DedupUploadPipeline,
    scheduler: AdaptiveScheduler,
}

impl Collector {
    pub fn new(
        source: Box<dyn RecordSource>,
        plan: RequestPlan,
        engine: TemporalFeatureEngine,
        pipeline: DedupUploadPipeline,
        scheduler: AdaptiveScheduler,
    ) -> Self {
        Self {
            source,
            plan,
            decoder: RecordDecoder::default(),
            assembler: SnapshotAssembler::new(),
            engine,
            pipeline,
            scheduler,
        }
    }

    /// Swap in a decoder with different layouts
    pub fn with_decoder(mut self, decoder: RecordDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Build every component from configuration.
    ///
    /// Fails only when no record source can be established. A storage backend that
    /// cannot start falls back to local files under `storage.local_root`.
    pub async fn from_config(config: &Config, today: NaiveDate) -> anyhow::Result<Self> {
        let source = build_source(config).await?;
        let store = build_store(config);

        let engine = TemporalFeatureEngine::new(config.features.to_feature_config(), today);
        let ledger = UploadLedger::open(
            config.pipeline.ledger_path.clone(),
            config.pipeline.ledger_rotation,
            today,
        );
        let pipeline =
            DedupUploadPipeline::new(store, ledger, config.pipeline.to_pipeline_config());
        let scheduler = AdaptiveScheduler::new(config.scheduler.to_scheduler_config());

        let plan = RequestPlan {
            data_specs: config.source.data_specs.clone(),
            place_codes: config.source.place_codes,
            races_per_place: config.source.races_per_place,
            limits: config.source.batch_limits(),
        };

        Ok(Self::new(source, plan, engine, pipeline, scheduler))
    }

    pub fn engine(&self) -> &TemporalFeatureEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TemporalFeatureEngine {
        &mut self.engine
    }

    pub fn pipeline(&self) -> &DedupUploadPipeline {
        &self.pipeline
    }

    /// Run one full cycle at `now` (local time)
    pub async fn run_cycle(&mut self, now: NaiveDateTime) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.cycle(cycle_id, now).instrument(span).await
    }

    async fn cycle(&mut self, cycle_id: Uuid, now: NaiveDateTime) -> CycleReport {
        let started = Instant::now();
        let today = now.date();
        self.pipeline.ledger_mut().roll_over(today);
        self.engine.roll_over(today);

        let requests = self.plan.requests(today);
        let collect_started = Instant::now();
        let raw = collect_batch(self.source.as_mut(), &requests, self.plan.limits).await;
        record_latency(LatencyMetric::Collect, collect_started.elapsed());

        let records_read = raw.len();
        let decoded: Vec<_> = raw.iter().filter_map(|r| self.decoder.decode(r)).collect();
        let records_decoded = decoded.len();
        let records_dropped = records_read - records_decoded;

        let mut snapshots = self.assembler.assemble(decoded);
        self.engine.enrich_all(&mut snapshots);
        if self.engine.flush_policy() == FlushPolicy::PerCycle {
            if let Err(e) = self.engine.flush() {
                tracing::warn!(error = %e, "Feature history not persisted");
            }
        }

        let commit_started = Instant::now();
        let commit = self.pipeline.commit(&snapshots).await;
        record_latency(LatencyMetric::Commit, commit_started.elapsed());

        let next_interval = self.scheduler.next_interval(&snapshots, now);

        let report = CycleReport {
            cycle_id,
            started_at: now,
            records_read,
            records_decoded,
            records_dropped,
            races: snapshots.len(),
            snapshots: snapshot_count(&snapshots),
            commit,
            next_interval_secs: next_interval.as_secs(),
        };
        self.record_metrics(&report);
        record_latency(LatencyMetric::Cycle, started.elapsed());

        tracing::info!(
            records = report.records_read,
            dropped = report.records_dropped,
            races = report.races,
            committed = report.commit.committed.len(),
            skipped = report.commit.skipped,
            failed = report.commit.failed,
            next_interval_secs = report.next_interval_secs,
            "Cycle complete"
        );
        report
    }

    fn record_metrics(&self, report: &CycleReport) {
        increment_counter(CounterMetric::Cycles, 1);
        increment_counter(CounterMetric::RecordsRead, report.records_read as u64);
        increment_counter(CounterMetric::RecordsDecoded, report.records_decoded as u64);
        increment_counter(CounterMetric::RecordsDropped, report.records_dropped as u64);
        increment_counter(
            CounterMetric::SnapshotsCommitted,
            report.commit.committed.len() as u64,
        );
        increment_counter(CounterMetric::SnapshotsSkipped, report.commit.skipped as u64);
        increment_counter(CounterMetric::SnapshotsFailed, report.commit.failed as u64);
        set_gauge(GaugeMetric::LedgerSize, self.pipeline.ledger().len() as f64);
        set_gauge(GaugeMetric::HistoryRaces, self.engine.race_count() as f64);
        set_gauge(GaugeMetric::NextIntervalSecs, report.next_interval_secs as f64);
    }

    /// Poll until Ctrl-C
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` resolves; a cycle in progress always finishes first
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        loop {
            let now = chrono::Local::now().naive_local();
            let report = self.run_cycle(now).await;

            tokio::select! {
                _ = tokio::time::sleep(report.next_interval()) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        self.engine.flush()?;
        tracing::info!(
            ledger_entries = self.pipeline.ledger().len(),
            history_races = self.engine.race_count(),
            "Collector stopped"
        );
        Ok(())
    }

    /// Decode and assemble a batch without features or uploads
    pub fn preview(&self, raw: &[RawRecord]) -> SnapshotMap {
        self.assembler
            .assemble(raw.iter().filter_map(|r| self.decoder.decode(r)))
    }
}

async fn build_source(config: &Config) -> anyhow::Result<Box<dyn RecordSource>> {
    match &config.source.replay_path {
        Some(path) => {
            let replay = ReplaySource::from_file(config.source.kind, path).await?;
            Ok(Box::new(replay))
        }
        None => anyhow::bail!(
            "no record source available: set source.replay_path to a recorded feed"
        ),
    }
}

fn build_store(config: &Config) -> Arc<dyn ObjectStore> {
    let local = || -> Arc<dyn ObjectStore> { Arc::new(LocalStore::new(&config.storage.local_root)) };
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Local => local(),
        StorageBackend::Gcs => match GcsStore::new(config.storage.gcs_config()) {
            Ok(gcs) => Arc::new(gcs),
            Err(e) => {
                tracing::error!(error = %e, "GCS unavailable, writing to local storage instead");
                local()
            }
        },
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::info!(store = %store.describe(), "Storage backend ready");
    store
}
