//! JSON state files
//!
//! Durable state (feature history, upload ledger) is kept in small JSON documents.
//! Each document is owned by exactly one component, which decides when to flush it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// State file failures. Callers log these and keep their in-memory state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// When a component writes its state back to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// After every mutation
    #[default]
    EveryWrite,
    /// Once at the end of each cycle
    PerCycle,
}

/// A JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing file yields `T::default()`
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| PersistenceError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the document via a temp file and rename
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
            PersistenceError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}
