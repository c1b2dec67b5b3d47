//! Temporal feature engine
//!
//! Keeps the last observed odds per race, odds type and entity across cycles and
//! process restarts, and derives probability shifts and odds gaps from it.

use super::types::{EntityFeatures, FeatureDetail, HistoryEntry, HistoryState, OddsType};
use crate::snapshot::{RaceSnapshot, SnapshotMap};
use crate::record::DecodedRecord;
use crate::store::{FlushPolicy, JsonStore, PersistenceError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Decimal places kept for the odds gap ratio
const GAP_RATIO_DP: u32 = 3;
/// Decimal places kept for probability shifts
const PROB_DIFF_DP: u32 = 4;
/// Decimal places kept for pair odds shifts
const ODDS_DIFF_DP: u32 = 1;

/// Feature engine configuration
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Ratio to the next-shorter price at which a gap is flagged
    pub gap_threshold: Decimal,
    /// When history is written back
    pub flush: FlushPolicy,
    /// History file; `None` keeps history in memory only
    pub history_path: Option<PathBuf>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            gap_threshold: dec!(1.5),
            flush: FlushPolicy::EveryWrite,
            history_path: None,
        }
    }
}

/// Stateful feature engine; sole owner of [`HistoryState`]
pub struct TemporalFeatureEngine {
    config: FeatureConfig,
    history: HistoryState,
    store: Option<JsonStore>,
    dirty: bool,
    day: NaiveDate,
}

impl TemporalFeatureEngine {
    /// Create an engine, restoring today's history from the configured file.
    ///
    /// Races dated before `today` (by their YYYYMMDD prefix) are not restored. An unreadable
    /// history file is logged and replaced by an empty history.
    pub fn new(config: FeatureConfig, today: NaiveDate) -> Self {
        let store = config.history_path.clone().map(JsonStore::new);
        let history = store
            .as_ref()
            .map(|store| Self::restore(store, today))
            .unwrap_or_default();

        Self {
            config,
            history,
            store,
            dirty: false,
            day: today,
        }
    }

    /// In-memory engine with default thresholds
    pub fn in_memory() -> Self {
        Self::new(FeatureConfig::default(), NaiveDate::MIN)
    }

    fn restore(store: &JsonStore, today: NaiveDate) -> HistoryState {
        let prefix = today.format("%Y%m%d").to_string();
        match store.load::<HistoryState>() {
            Ok(state) => {
                let restored: HistoryState = state
                    .into_iter()
                    .filter(|(race_id, _)| !dated_before(race_id, &prefix))
                    .collect();
                if !restored.is_empty() {
                    tracing::info!(races = restored.len(), "Restored feature history");
                }
                restored
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read feature history, starting fresh");
                HistoryState::new()
            }
        }
    }

    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    pub fn race_count(&self) -> usize {
        self.history.len()
    }

    /// Compute features for one race and odds type, then overwrite history with `current`.
    ///
    /// O1 results are ordered by ascending odds; O2 results by entity key.
    pub fn update(
        &mut self,
        race_id: &str,
        odds_type: OddsType,
        current: &BTreeMap<String, Decimal>,
    ) -> Vec<EntityFeatures> {
        let features = match odds_type {
            OddsType::O1 => self.win_features(race_id, current),
            OddsType::O2 => self.pair_features(race_id, current),
        };

        let entities = self
            .history
            .entry(race_id.to_string())
            .or_default()
            .entry(odds_type)
            .or_default();
        for f in &features {
            let last_prob = match f.detail {
                FeatureDetail::Win { implied_prob, .. } => Some(implied_prob),
                FeatureDetail::Pair { .. } => None,
            };
            entities.insert(
                f.entity_key.clone(),
                HistoryEntry {
                    last_odds: f.latest_odds,
                    last_prob,
                },
            );
        }
        self.dirty = true;

        if self.config.flush == FlushPolicy::EveryWrite {
            if let Err(e) = self.flush() {
                tracing::warn!(race_id, error = %e, "Feature history not persisted");
            }
        }

        features
    }

    fn last_entry(&self, race_id: &str, odds_type: OddsType, key: &str) -> Option<&HistoryEntry> {
        self.history.get(race_id)?.get(&odds_type)?.get(key)
    }

    fn win_features(
        &self,
        race_id: &str,
        current: &BTreeMap<String, Decimal>,
    ) -> Vec<EntityFeatures> {
        let mut sorted: Vec<(&String, Decimal)> = current.iter().map(|(k, v)| (k, *v)).collect();
        sorted.sort_by(|a, b| a.1.cmp(&b.1));

        let mut out = Vec::with_capacity(sorted.len());
        let mut prev_odds: Option<Decimal> = None;
        for (key, odds) in sorted {
            let implied_prob = implied_probability(odds);

            let mut odds_gap_ratio = Decimal::ONE;
            let mut is_odds_gap = 0;
            if let Some(prev) = prev_odds.filter(|p| *p > Decimal::ZERO) {
                let ratio = odds / prev;
                if ratio >= self.config.gap_threshold {
                    is_odds_gap = 1;
                }
                odds_gap_ratio = ratio.round_dp(GAP_RATIO_DP);
            }
            prev_odds = Some(odds);

            let prob_diff = self
                .last_entry(race_id, OddsType::O1, key)
                .and_then(|entry| entry.last_prob)
                .map(|last| (implied_prob - last).round_dp(PROB_DIFF_DP))
                .unwrap_or(Decimal::ZERO);

            out.push(EntityFeatures {
                entity_key: key.clone(),
                latest_odds: odds,
                detail: FeatureDetail::Win {
                    implied_prob,
                    odds_gap_ratio,
                    is_odds_gap,
                    prob_diff,
                },
            });
        }
        out
    }

    fn pair_features(
        &self,
        race_id: &str,
        current: &BTreeMap<String, Decimal>,
    ) -> Vec<EntityFeatures> {
        current
            .iter()
            .map(|(key, odds)| {
                let odds_diff = self
                    .last_entry(race_id, OddsType::O2, key)
                    .map(|entry| (*odds - entry.last_odds).round_dp(ODDS_DIFF_DP))
                    .unwrap_or(Decimal::ZERO);
                EntityFeatures {
                    entity_key: key.clone(),
                    latest_odds: *odds,
                    detail: FeatureDetail::Pair { odds_diff },
                }
            })
            .collect()
    }

    /// Attach features to every odds record in the snapshot
    pub fn enrich(&mut self, snapshot: &mut RaceSnapshot) {
        let mut inputs: Vec<(OddsType, BTreeMap<String, Decimal>)> = Vec::new();
        for record in snapshot.all_records() {
            let DecodedRecord::Odds(odds) = record else {
                continue;
            };
            if !odds.win_odds.is_empty() {
                let current = odds
                    .win_odds
                    .iter()
                    .map(|(runner, entry)| (runner.to_string(), entry.odds))
                    .collect();
                inputs.push((OddsType::O1, current));
            }
            if !odds.quinella_odds.is_empty() {
                let current = odds
                    .quinella_odds
                    .iter()
                    .map(|(pair, entry)| (pair.clone(), entry.odds))
                    .collect();
                inputs.push((OddsType::O2, current));
            }
        }

        for (odds_type, current) in inputs {
            let features = self.update(&snapshot.race_id, odds_type, &current);
            snapshot.features.insert(odds_type, features);
        }
    }

    /// Enrich all snapshots, oldest bucket first within each race
    pub fn enrich_all(&mut self, snapshots: &mut SnapshotMap) {
        for buckets in snapshots.values_mut() {
            for snapshot in buckets.values_mut() {
                self.enrich(snapshot);
            }
        }
    }

    /// Drop history of races dated before `today`; a no-op until the day changes
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today == self.day {
            return;
        }
        self.day = today;
        let prefix = today.format("%Y%m%d").to_string();
        let before = self.history.len();
        self.history.retain(|race_id, _| !dated_before(race_id, &prefix));
        let removed = before - self.history.len();
        if removed > 0 {
            tracing::info!(removed, day = %today, "Pruned feature history");
            self.dirty = true;
            if self.config.flush == FlushPolicy::EveryWrite {
                if let Err(e) = self.flush() {
                    tracing::warn!(error = %e, "Feature history not persisted");
                }
            }
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        self.config.flush
    }

    /// Write history to its file if anything changed since the last flush
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        let Some(store) = &self.store else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        store.save(&self.history)?;
        self.dirty = false;
        Ok(())
    }
}

/// True when the race id's `YYYYMMDD` prefix sorts before `today`
fn dated_before(race_id: &str, today: &str) -> bool {
    match race_id.get(0..8) {
        Some(date) if date.bytes().all(|b| b.is_ascii_digit()) => date < today,
        _ => false,
    }
}

/// `1 / odds`, or zero for non-positive odds
pub fn implied_probability(odds: Decimal) -> Decimal {
    if odds > Decimal::ZERO {
        Decimal::ONE / odds
    } else {
        Decimal::ZERO
    }
}
