//! Temporal feature module
//!
//! Derives implied-probability shifts, odds gaps and pair odds shifts from
//! successive odds observations of the same race

mod engine;
mod types;

pub use engine::{implied_probability, FeatureConfig, TemporalFeatureEngine};
pub use types::{
    EntityFeatures, EntityHistory, FeatureDetail, HistoryEntry, HistoryState, OddsType,
};
