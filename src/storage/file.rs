//! JSON file `LedgerStore`.
//!
//! The whole key space lives in one pretty-printed JSON object. Every
//! mutation rewrites the file (via a temp file + rename) so a crash never
//! leaves a half-written ledger behind.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{LedgerStore, Result, StoreError};

/// Default ledger file path.
pub const DEFAULT_LEDGER_FILE: &str = "dailybet_ledger.json";

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    /// Open (or lazily create) the ledger file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!(path = %path.display(), "No ledger file found, starting fresh");
            return Ok(Self {
                path,
                entries: Map::new(),
            });
        }

        let json = std::fs::read_to_string(&path)?;
        let entries: Map<String, Value> =
            serde_json::from_str(&json).map_err(|source| StoreError::Malformed {
                key: path.display().to_string(),
                source,
            })?;

        info!(path = %path.display(), keys = entries.len(), "Ledger loaded from disk");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the ledger file (for testing or reset).
    pub fn delete(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StoreError::Malformed {
                key: self.path.display().to_string(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), keys = self.entries.len(), "Ledger saved");
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Keep memory in step with disk.
            match previous {
                Some(v) => self.entries.insert(key.to_string(), v),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(previous) = self.entries.remove(key) {
            if let Err(e) = self.flush() {
                self.entries.insert(key.to_string(), previous);
                return Err(e);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
