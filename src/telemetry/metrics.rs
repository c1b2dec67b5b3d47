//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Raw records read from the source
    RecordsRead,
    /// Records decoded into typed or fallback records
    RecordsDecoded,
    /// Records dropped for lack of a race id
    RecordsDropped,
    /// Snapshots written to storage
    SnapshotsCommitted,
    /// Snapshots already in the ledger
    SnapshotsSkipped,
    /// Snapshot writes that failed
    SnapshotsFailed,
    /// Completed cycles
    Cycles,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Entries in the upload ledger
    LedgerSize,
    /// Races with feature history
    HistoryRaces,
    /// Delay chosen for the next cycle
    NextIntervalSecs,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Draining the record source
    Collect,
    /// Committing snapshots
    Commit,
    /// Whole cycle
    Cycle,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::RecordsRead => "keiba_records_read_total",
        CounterMetric::RecordsDecoded => "keiba_records_decoded_total",
        CounterMetric::RecordsDropped => "keiba_records_dropped_total",
        CounterMetric::SnapshotsCommitted => "keiba_snapshots_committed_total",
        CounterMetric::SnapshotsSkipped => "keiba_snapshots_skipped_total",
        CounterMetric::SnapshotsFailed => "keiba_snapshots_failed_total",
        CounterMetric::Cycles => "keiba_cycles_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::LedgerSize => "keiba_ledger_entries",
        GaugeMetric::HistoryRaces => "keiba_history_races",
        GaugeMetric::NextIntervalSecs => "keiba_next_interval_secs",
    }
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::Collect => "keiba_collect_latency_ms",
        LatencyMetric::Commit => "keiba_commit_latency_ms",
        LatencyMetric::Cycle => "keiba_cycle_latency_ms",
    }
}

/// Add to a counter
pub fn increment_counter(metric: CounterMetric, value: u64) {
    metrics::counter!(counter_name(metric)).increment(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = latency_name(metric);
    metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
    tracing::trace!(
        metric = metric_name,
        value_ms = duration.as_millis() as u64,
        "Recording latency"
    );
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            counter_name(CounterMetric::RecordsRead),
            counter_name(CounterMetric::Cycles),
            gauge_name(GaugeMetric::LedgerSize),
            latency_name(LatencyMetric::Cycle),
        ] {
            assert!(name.starts_with("keiba_"), "{name}");
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        increment_counter(CounterMetric::RecordsRead, 3);
        set_gauge(GaugeMetric::NextIntervalSecs, 30.0);
        record_latency(LatencyMetric::Commit, Duration::from_millis(12));
    }
}
