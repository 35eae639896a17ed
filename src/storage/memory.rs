//! In-memory `LedgerStore`.
//!
//! Clones share the same entries, so a test can keep a handle after moving
//! the store into a `Ledger`. Reads and writes can be made to fail on demand.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LedgerStore, Result, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write or removal fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{op} disabled")));
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check(&self.fail_reads, "read")?;
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.check(&self.fail_writes, "write")?;
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.check(&self.fail_writes, "write")?;
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_entries() {
        let mut store = MemoryStore::new();
        let handle = store.clone();
        store.set("k", json!(1)).unwrap();
        assert_eq!(handle.get("k").unwrap(), Some(json!(1)));
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_remove_missing_key_ok() {
        let mut store = MemoryStore::new();
        assert!(store.remove("nope").is_ok());
        assert!(store.is_empty());
    }

    #[test]
    fn test_forced_failures() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.set("k", json!(1)).is_err());
        assert!(store.get("k").unwrap().is_none());

        store.set_fail_reads(true);
        assert!(matches!(store.get("k"), Err(StoreError::Unavailable(_))));

        store.set_fail_reads(false);
        store.set_fail_writes(false);
        store.set("k", json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }
}
