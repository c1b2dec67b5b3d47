//! Upload ledger: cache keys already committed to storage

use crate::store::{JsonStore, PersistenceError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// What happens to ledger entries when the day changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerRotation {
    /// Keep only keys whose path carries the current date
    #[default]
    Daily,
    /// Never drop entries
    Never,
}

/// Durable set of committed cache keys; grows only through [`UploadLedger::record`]
#[derive(Debug)]
pub struct UploadLedger {
    keys: BTreeSet<String>,
    store: Option<JsonStore>,
    rotation: LedgerRotation,
    day: NaiveDate,
}

impl UploadLedger {
    /// Open the ledger file (if any) and apply rotation for `today`
    pub fn open(path: Option<PathBuf>, rotation: LedgerRotation, today: NaiveDate) -> Self {
        let store = path.map(JsonStore::new);
        let keys = match store.as_ref().map(|s| s.load::<BTreeSet<String>>()) {
            Some(Ok(keys)) => keys,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not read upload ledger, starting empty");
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };

        let mut ledger = Self {
            keys,
            store,
            rotation,
            day: today,
        };
        if ledger.prune_for(today) > 0 {
            ledger.persist();
        }
        tracing::info!(entries = ledger.len(), "Upload ledger opened");
        ledger
    }

    pub fn in_memory() -> Self {
        Self {
            keys: BTreeSet::new(),
            store: None,
            rotation: LedgerRotation::Never,
            day: NaiveDate::MIN,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add a confirmed key and write the ledger immediately
    pub fn record(&mut self, key: String) -> Result<(), PersistenceError> {
        if !self.keys.insert(key) {
            return Ok(());
        }
        match &self.store {
            Some(store) => store.save(&self.keys),
            None => Ok(()),
        }
    }

    /// Apply day rotation when the date has moved on
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today == self.day {
            return;
        }
        self.day = today;
        let removed = self.prune_for(today);
        if removed > 0 {
            tracing::info!(removed, day = %today, "Rotated upload ledger");
            self.persist();
        }
    }

    fn prune_for(&mut self, today: NaiveDate) -> usize {
        if self.rotation == LedgerRotation::Never {
            return 0;
        }
        let segment = format!("/{}/", today.format("%Y%m%d"));
        let before = self.keys.len();
        self.keys.retain(|key| key.contains(&segment));
        before - self.keys.len()
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.keys) {
                tracing::warn!(error = %e, "Upload ledger not persisted");
            }
        }
    }
}
