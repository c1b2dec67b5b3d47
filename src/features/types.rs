//! Temporal feature types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Odds family a history belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OddsType {
    /// Single odds per runner (win)
    O1,
    /// Odds per runner pair (quinella)
    O2,
}

impl OddsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddsType::O1 => "O1",
            OddsType::O2 => "O2",
        }
    }
}

impl fmt::Display for OddsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last observed value of one odds entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub last_odds: Decimal,
    /// Only tracked for single-odds entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prob: Option<Decimal>,
}

/// Entity key → last observation
pub type EntityHistory = BTreeMap<String, HistoryEntry>;

/// Race id → odds type → entity history
pub type HistoryState = BTreeMap<String, BTreeMap<OddsType, EntityHistory>>;

/// Features derived for one entity in one update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFeatures {
    /// Runner number or "a-b" pair key
    pub entity_key: String,
    pub latest_odds: Decimal,
    #[serde(flatten)]
    pub detail: FeatureDetail,
}

/// Odds-type specific part of [`EntityFeatures`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeatureDetail {
    Win {
        implied_prob: Decimal,
        /// Odds relative to the next-shorter entity (1.0 for the favourite)
        odds_gap_ratio: Decimal,
        /// 1 when the ratio crosses the gap threshold
        is_odds_gap: u8,
        prob_diff: Decimal,
    },
    Pair {
        odds_diff: Decimal,
    },
}

impl EntityFeatures {
    pub fn prob_diff(&self) -> Option<Decimal> {
        match self.detail {
            FeatureDetail::Win { prob_diff, .. } => Some(prob_diff),
            FeatureDetail::Pair { .. } => None,
        }
    }

    pub fn odds_gap_ratio(&self) -> Option<Decimal> {
        match self.detail {
            FeatureDetail::Win { odds_gap_ratio, .. } => Some(odds_gap_ratio),
            FeatureDetail::Pair { .. } => None,
        }
    }

    pub fn is_odds_gap(&self) -> bool {
        matches!(self.detail, FeatureDetail::Win { is_odds_gap: 1, .. })
    }

    pub fn odds_diff(&self) -> Option<Decimal> {
        match self.detail {
            FeatureDetail::Pair { odds_diff } => Some(odds_diff),
            FeatureDetail::Win { .. } => None,
        }
    }
}
