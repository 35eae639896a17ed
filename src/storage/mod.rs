//! Persistence layer.
//!
//! The engine talks to durable state through the `LedgerStore` port, a plain
//! key-value contract. `Ledger` layers typed access on top of it:
//!
//! - `wallets`: participant name → integer balance
//! - `history`: append-only list of completed rounds
//! - `processed:<winner>:<pool>:<bets>`: settlement markers (presence only)
//!
//! Lenient readers fall back to empty data and record the fault so callers
//! can surface it. Read-modify-write paths use the strict readers so a broken
//! store never gets overwritten with defaults.

pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::types::HistoryEntry;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub const WALLETS_KEY: &str = "wallets";
pub const HISTORY_KEY: &str = "history";

/// Marker key guarding one settlement.
pub fn processed_key(winner_id: &str, total_pool: i64, bet_count: usize) -> String {
    format!("processed:{winner_id}:{total_pool}:{bet_count}")
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed record '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Durable key-value storage.
#[cfg_attr(test, mockall::automock)]
pub trait LedgerStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct Ledger {
    store: Box<dyn LedgerStore>,
    faults: Vec<StoreError>,
}

impl Ledger {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Self {
            store,
            faults: Vec::new(),
        }
    }

    /// Convenience constructor over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    // -- wallets ------------------------------------------------------------

    /// Strict read of the wallet map. A missing record is an empty map.
    pub fn try_wallets(&self) -> Result<BTreeMap<String, i64>> {
        self.read_or_default(WALLETS_KEY)
    }

    /// Wallet map, or an empty one if the store misbehaves.
    pub fn wallets(&mut self) -> BTreeMap<String, i64> {
        match self.try_wallets() {
            Ok(w) => w,
            Err(e) => {
                self.record_fault("wallets", e);
                BTreeMap::new()
            }
        }
    }

    /// Stored balance for `name`, or `default` when unseen or unreadable.
    pub fn balance_of(&mut self, name: &str, default: i64) -> i64 {
        self.wallets().get(name).copied().unwrap_or(default)
    }

    pub fn set_balance(&mut self, name: &str, balance: i64) -> Result<()> {
        let mut wallets = self.try_wallets()?;
        wallets.insert(name.to_string(), balance);
        self.write_wallets(&wallets)?;
        debug!(name, balance, "Wallet updated");
        Ok(())
    }

    pub fn write_wallets(&mut self, wallets: &BTreeMap<String, i64>) -> Result<()> {
        let value = serde_json::to_value(wallets).map_err(|source| StoreError::Malformed {
            key: WALLETS_KEY.to_string(),
            source,
        })?;
        self.store.set(WALLETS_KEY, value)
    }

    /// Wallets ordered by balance, richest first.
    pub fn leaderboard(&mut self) -> Vec<(String, i64)> {
        let mut rows: Vec<(String, i64)> = self.wallets().into_iter().collect();
        rows.sort_by(|(name_a, a), (name_b, b)| b.cmp(a).then_with(|| name_a.cmp(name_b)));
        rows
    }

    // -- history ------------------------------------------------------------

    pub fn try_history(&self) -> Result<Vec<HistoryEntry>> {
        self.read_or_default(HISTORY_KEY)
    }

    /// History in insertion order, or empty if unreadable.
    pub fn history(&mut self) -> Vec<HistoryEntry> {
        match self.try_history() {
            Ok(h) => h,
            Err(e) => {
                self.record_fault("history", e);
                Vec::new()
            }
        }
    }

    pub fn history_newest_first(&mut self) -> Vec<HistoryEntry> {
        let mut history = self.history();
        history.reverse();
        history
    }

    pub fn append_history(&mut self, entry: HistoryEntry) -> Result<()> {
        let mut history = self.try_history()?;
        history.push(entry);
        let value = serde_json::to_value(&history).map_err(|source| StoreError::Malformed {
            key: HISTORY_KEY.to_string(),
            source,
        })?;
        self.store.set(HISTORY_KEY, value)
    }

    // -- settlement markers ---------------------------------------------------

    pub fn is_processed(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key)?.is_some())
    }

    pub fn mark_processed(&mut self, key: &str) -> Result<()> {
        self.store.set(key, Value::Bool(true))
    }

    pub fn remove_marker(&mut self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    // -- maintenance ----------------------------------------------------------

    /// Delete all wallets and history. Settlement markers are left alone.
    pub fn reset_data(&mut self) -> Result<()> {
        self.store.remove(HISTORY_KEY)?;
        self.store.remove(WALLETS_KEY)?;
        info!("Ledger wallets and history cleared");
        Ok(())
    }

    /// Faults recorded by lenient reads since the last call.
    pub fn take_faults(&mut self) -> Vec<StoreError> {
        std::mem::take(&mut self.faults)
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    fn record_fault(&mut self, what: &str, error: StoreError) {
        warn!(record = what, error = %error, "Ledger read failed, using defaults");
        self.faults.push(error);
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.store.get(key)? {
            Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            }),
            None => Ok(T::default()),
        }
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("faults", &self.faults.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
