//! Configuration types for keiba-ingest

use crate::features::FeatureConfig;
use crate::pipeline::{
    GcsConfig, LedgerRotation, PipelineConfig, DEFAULT_GCS_BUCKET, GCS_API_URL,
};
use crate::record::Source;
use crate::scheduler::SchedulerConfig;
use crate::source::{BatchLimits, DEFAULT_DATA_SPECS};
use crate::store::FlushPolicy;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides the configured GCS bucket
pub const GCS_BUCKET_ENV: &str = "GCS_BUCKET_NAME";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Record source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Organization the records come from
    #[serde(default = "default_source_kind")]
    pub kind: Source,

    /// Recorded raw records to replay instead of a live link
    #[serde(default)]
    pub replay_path: Option<PathBuf>,

    /// Vendor data spec codes opened each cycle
    #[serde(default = "default_data_specs")]
    pub data_specs: Vec<String>,

    /// Highest place code scanned for realtime keys
    #[serde(default = "default_place_codes")]
    pub place_codes: u8,

    #[serde(default = "default_races_per_place")]
    pub races_per_place: u8,

    /// Consecutive file-switch reads tolerated per key
    #[serde(default = "default_max_empty_reads")]
    pub max_empty_reads: usize,
}

fn default_source_kind() -> Source {
    Source::Jra
}
fn default_data_specs() -> Vec<String> {
    DEFAULT_DATA_SPECS.iter().map(|s| s.to_string()).collect()
}
fn default_place_codes() -> u8 {
    59
}
fn default_races_per_place() -> u8 {
    12
}
fn default_max_empty_reads() -> usize {
    1000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            replay_path: None,
            data_specs: default_data_specs(),
            place_codes: default_place_codes(),
            races_per_place: default_races_per_place(),
            max_empty_reads: default_max_empty_reads(),
        }
    }
}

impl SourceConfig {
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_empty_reads: self.max_empty_reads,
            ..Default::default()
        }
    }
}

/// Temporal feature configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    /// History state file; in-memory only when unset
    #[serde(default = "default_history_path")]
    pub history_path: Option<PathBuf>,

    /// Odds ratio to the next-lower entity that flags a gap
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: Decimal,

    #[serde(default)]
    pub flush: FlushPolicy,
}

fn default_history_path() -> Option<PathBuf> {
    Some(PathBuf::from("./state/tcs_history.json"))
}
fn default_gap_threshold() -> Decimal {
    Decimal::new(15, 1) // 1.5
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            gap_threshold: default_gap_threshold(),
            flush: FlushPolicy::default(),
        }
    }
}

impl FeaturesConfig {
    pub fn to_feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            gap_threshold: self.gap_threshold,
            flush: self.flush,
            history_path: self.history_path.clone(),
        }
    }
}

/// Upload pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSection {
    /// Upload ledger file; in-memory only when unset
    #[serde(default = "default_ledger_path")]
    pub ledger_path: Option<PathBuf>,

    /// Maximum writes in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_history_prefix")]
    pub history_prefix: String,

    #[serde(default = "default_latest_prefix")]
    pub latest_prefix: String,

    #[serde(default)]
    pub ledger_rotation: LedgerRotation,
}

fn default_ledger_path() -> Option<PathBuf> {
    Some(PathBuf::from("./state/upload_ledger.json"))
}
fn default_concurrency() -> usize {
    10
}
fn default_history_prefix() -> String {
    "timeseries".to_string()
}
fn default_latest_prefix() -> String {
    "latest".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            concurrency: default_concurrency(),
            history_prefix: default_history_prefix(),
            latest_prefix: default_latest_prefix(),
            ledger_rotation: LedgerRotation::default(),
        }
    }
}

impl PipelineSection {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.concurrency,
            history_prefix: self.history_prefix.clone(),
            latest_prefix: self.latest_prefix.clone(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Gcs,
    /// Keep objects in memory (dry runs)
    Memory,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default = "default_gcs_bucket")]
    pub gcs_bucket: String,

    /// Environment variable holding the GCS access token
    #[serde(default = "default_gcs_token_env")]
    pub gcs_token_env: String,

    #[serde(default = "default_gcs_timeout_secs")]
    pub gcs_timeout_secs: u64,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data")
}
fn default_gcs_bucket() -> String {
    DEFAULT_GCS_BUCKET.to_string()
}
fn default_gcs_token_env() -> String {
    "GCS_ACCESS_TOKEN".to_string()
}
fn default_gcs_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            gcs_bucket: default_gcs_bucket(),
            gcs_token_env: default_gcs_token_env(),
            gcs_timeout_secs: default_gcs_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// GCS settings with the bucket env override applied
    pub fn gcs_config(&self) -> GcsConfig {
        let bucket = std::env::var(GCS_BUCKET_ENV)
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.gcs_bucket.clone());
        GcsConfig {
            base_url: GCS_API_URL.to_string(),
            bucket,
            token_env: self.gcs_token_env.clone(),
            timeout: Duration::from_secs(self.gcs_timeout_secs),
        }
    }
}

/// Polling cadence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSection {
    #[serde(default = "default_short_interval_secs")]
    pub short_interval_secs: u64,

    #[serde(default = "default_long_interval_secs")]
    pub long_interval_secs: u64,

    /// Minutes after post time a race stays imminent
    #[serde(default = "default_lookback_mins")]
    pub lookback_mins: i64,

    /// Minutes before post time a race becomes imminent
    #[serde(default = "default_lookahead_mins")]
    pub lookahead_mins: i64,
}

fn default_short_interval_secs() -> u64 {
    30
}
fn default_long_interval_secs() -> u64 {
    300
}
fn default_lookback_mins() -> i64 {
    5
}
fn default_lookahead_mins() -> i64 {
    15
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            short_interval_secs: default_short_interval_secs(),
            long_interval_secs: default_long_interval_secs(),
            lookback_mins: default_lookback_mins(),
            lookahead_mins: default_lookahead_mins(),
        }
    }
}

impl SchedulerSection {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            short_interval: Duration::from_secs(self.short_interval_secs),
            long_interval: Duration::from_secs(self.long_interval_secs),
            lookback: chrono::Duration::minutes(self.lookback_mins),
            lookahead: chrono::Duration::minutes(self.lookahead_mins),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the collector cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.concurrency == 0 {
            anyhow::bail!("pipeline.concurrency must be at least 1");
        }
        if self.features.gap_threshold <= Decimal::ONE {
            anyhow::bail!("features.gap_threshold must be greater than 1");
        }
        if self.scheduler.short_interval_secs == 0
            || self.scheduler.short_interval_secs > self.scheduler.long_interval_secs
        {
            anyhow::bail!("scheduler intervals must satisfy 0 < short <= long");
        }
        if self.scheduler.lookback_mins < 0 || self.scheduler.lookahead_mins < 0 {
            anyhow::bail!("scheduler windows must not be negative");
        }
        if self.source.data_specs.is_empty() {
            anyhow::bail!("source.data_specs must name at least one data spec");
        }
        Ok(())
    }
}
