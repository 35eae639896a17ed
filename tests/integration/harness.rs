//! Deterministic table for integration testing.
//!
//! Wraps a `Round` over a shared `MemoryStore` so tests can inspect the
//! ledger and inject storage faults while the round is running. Clock, ids
//! and randomness are all fixed.

use chrono::{TimeZone, Utc};

use dailybet::config::GameConfig;
use dailybet::engine::Round;
use dailybet::ports::{seeded, FixedClock, RandomSource, SequentialIds};
use dailybet::storage::{Ledger, LedgerStore, MemoryStore, WALLETS_KEY};
use dailybet::types::Phase;

pub struct Table {
    pub round: Round,
    pub store: MemoryStore,
}

impl Table {
    pub fn new(names: &[&str]) -> Self {
        Self::with_store(names, MemoryStore::new())
    }

    /// Seat `names` over an existing store (e.g. a ledger from an earlier
    /// session).
    pub fn with_store(names: &[&str], store: MemoryStore) -> Self {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        let mut round = Round::new(GameConfig::default(), Ledger::new(Box::new(store.clone())))
            .with_clock(clock)
            .with_ids(SequentialIds::new("p"));
        for name in names {
            round.add_participant(name).unwrap();
        }
        Self { round, store }
    }

    pub fn id(&self, name: &str) -> String {
        self.round
            .find_by_name(name)
            .unwrap_or_else(|| panic!("no participant named {name}"))
            .id
            .clone()
    }

    pub fn balance(&self, name: &str) -> i64 {
        self.round.find_by_name(name).unwrap().balance
    }

    /// Current bettor's name.
    pub fn turn(&self) -> String {
        self.round.turn().expect("betting is not open").bettor.name
    }

    /// Whoever's turn it is backs `candidate`.
    pub fn bet(&mut self, candidate: &str, amount: i64) {
        let id = self.id(candidate);
        self.round.place_bet(&id, amount).unwrap();
    }

    /// Draw with a source that always lands on eligible index `index`.
    pub fn draw_index(&mut self, index: usize) {
        assert_eq!(self.round.phase(), Phase::Odds);
        self.round.trigger_draw(&mut Pick(index)).unwrap();
        self.round.complete_draw().unwrap();
    }

    pub fn draw_seeded(&mut self, seed: u64) {
        self.round.trigger_draw(&mut seeded(seed)).unwrap();
        self.round.complete_draw().unwrap();
    }

    /// Persisted wallet for `name`, read straight from the store.
    pub fn stored_wallet(&self, name: &str) -> Option<i64> {
        let wallets = self.store.get(WALLETS_KEY).unwrap()?;
        wallets.get(name).and_then(|v| v.as_i64())
    }
}

/// Always picks the same eligible index.
pub struct Pick(pub usize);

impl RandomSource for Pick {
    fn uniform(&mut self, n: usize) -> usize {
        self.0 % n
    }
}
