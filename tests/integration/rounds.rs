//! End-to-end round scenarios.

use dailybet::engine::settlement::Settlement;
use dailybet::storage::{LedgerStore, MemoryStore, HISTORY_KEY};
use dailybet::types::{ErrorKind, GameError, Phase};
use rust_decimal_macros::dec;

use crate::harness::Table;

#[test]
fn test_cyclic_round_winner_b() {
    let mut t = Table::new(&["A", "B", "C"]);
    t.round.start_betting().unwrap();
    t.bet("B", 100);
    t.bet("C", 100);
    t.bet("A", 100);
    assert_eq!(t.round.phase(), Phase::Odds);

    let odds = t.round.odds();
    assert_eq!(odds.total_pool, 300);
    for entry in &odds.entries {
        assert_eq!(entry.multiplier, dec!(3.00));
        assert_eq!(entry.total_bets_count, 1);
    }

    t.draw_index(1); // B
    let results = t.round.results().unwrap();
    assert_eq!(results.winner.name, "B");

    assert_eq!(t.balance("A"), 1200);
    assert_eq!(t.balance("B"), 900);
    assert_eq!(t.balance("C"), 900);
    assert_eq!(t.stored_wallet("A"), Some(1200));
    assert_eq!(t.stored_wallet("B"), Some(900));
    assert_eq!(t.stored_wallet("C"), Some(900));

    let history = t.round.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winner_name, "B");
    assert_eq!(history[0].total_pool, 300);
    assert_eq!(history[0].date.to_rfc3339(), "2026-03-02T09:00:00+00:00");
}

#[test]
fn test_buyout_round() {
    let mut t = Table::new(&["W", "X", "Y"]);
    t.round.start_betting().unwrap();

    t.bet("X", 100); // W → X
    t.bet("X", 200); // X → X
    assert_eq!(t.turn(), "Y");

    let x = t.id("X");
    let outcome = t.round.buyout(&x).unwrap();
    assert_eq!(outcome.new_balance, 1);
    assert_eq!(outcome.invalidated.len(), 2);
    assert_eq!(t.balance("X"), 1);
    assert_eq!(t.stored_wallet("X"), Some(1));
    assert!(t.round.find_by_name("X").unwrap().is_immune);
    assert!(t.round.bets().is_empty());

    // Y still goes, then W and X re-bet.
    assert_eq!(t.turn(), "Y");
    let err = t.round.place_bet(&x, 10).unwrap_err();
    assert!(matches!(err, GameError::ImmuneCandidate(_)));

    t.bet("W", 50); // Y → W
    let turn = t.round.turn().unwrap();
    assert_eq!(turn.bettor.name, "W");
    assert!(turn.is_rebet);
    assert_eq!(turn.step, 4);
    assert_eq!(turn.total_steps, 5);

    t.bet("Y", 100); // W → Y
    let w = t.id("W");
    let err = t.round.place_bet(&w, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    t.bet("W", 1); // X → W, all in
    assert_eq!(t.round.phase(), Phase::Odds);
    assert_eq!(t.round.odds().total_pool, 151);
    assert!(t.round.odds().entry_for(&x).unwrap().is_underdog());

    // X is immune, so eligible = [W, Y]; index 0 is W.
    t.draw_index(0);
    assert_eq!(t.round.winner().unwrap().name, "W");

    // pool 151, on W 51: Y gets floor(50*151/51) = 148, X gets floor(151/51) = 2.
    assert_eq!(t.balance("Y"), 1000 - 50 + 148);
    assert_eq!(t.balance("X"), 1 - 1 + 2);
    assert_eq!(t.balance("W"), 900);
}

#[test]
fn test_second_buyout_rejected() {
    let mut t = Table::new(&["a", "b"]);
    t.round.start_betting().unwrap();
    t.round.buyout_current().unwrap();
    let err = t.round.buyout_current().unwrap_err();
    assert!(matches!(err, GameError::AlreadyImmune(_)));
    assert_eq!(t.balance("a"), 1);
    assert_eq!(t.stored_wallet("a"), Some(1));

    // One unit left to bet with.
    let b = t.id("b");
    let err = t.round.place_bet(&b, 2).unwrap_err();
    assert!(matches!(err, GameError::InsufficientFunds { needed: 2, available: 1 }));
    t.bet("b", 1);
    assert_eq!(t.turn(), "b");
}

#[test]
fn test_settlement_retry_is_idempotent() {
    let mut t = Table::new(&["a", "b"]);
    t.round.start_betting().unwrap();
    t.bet("b", 100);
    t.bet("a", 100);
    t.draw_index(0);

    let wallets = t.store.get("wallets").unwrap();
    let again = t.round.retry_settlement().unwrap();
    assert!(matches!(again, Settlement::AlreadyProcessed { .. }));
    assert_eq!(t.store.get("wallets").unwrap(), wallets);
    assert_eq!(t.round.history().len(), 1);
}

#[test]
fn test_settlement_marker_guards_reload() {
    let store = MemoryStore::new();
    let mut t = Table::with_store(&["a", "b"], store.clone());
    t.round.start_betting().unwrap();
    t.bet("b", 100);
    t.bet("b", 100);
    t.draw_index(0); // nobody backed a
    assert_eq!(t.balance("a"), 900);
    assert_eq!(t.balance("b"), 900);

    // Same ids (sequential) in a second session over the same ledger.
    let mut again = Table::with_store(&["a", "b"], store);
    assert_eq!(again.balance("a"), 900);
    again.round.start_betting().unwrap();
    again.bet("b", 100);
    again.bet("b", 100);
    again.draw_index(0);
    assert!(!again.round.results().unwrap().settlement_applied);
    assert_eq!(again.round.history().len(), 1);
}

#[test]
fn test_new_round_reloads_balances() {
    let mut t = Table::new(&["a", "x"]);
    t.round.start_betting().unwrap();
    t.round.buyout_current().unwrap(); // a is immune
    t.bet("x", 1);
    t.bet("x", 500);
    t.draw_index(0);
    assert_eq!(t.round.winner().unwrap().name, "x");

    t.round.new_round().unwrap();
    assert_eq!(t.round.phase(), Phase::Setup);
    assert_eq!(t.balance("a"), t.stored_wallet("a").unwrap());
    assert_eq!(t.balance("x"), t.stored_wallet("x").unwrap());
    assert!(t.round.participants().iter().all(|p| !p.is_immune));

    t.round.add_participant("late").unwrap();
    t.round.start_betting().unwrap();
    assert_eq!(t.round.turn().unwrap().total_steps, 3);
}

#[test]
fn test_leaderboard_and_history_across_rounds() {
    let mut t = Table::new(&["a", "b", "c"]);
    for winner in [0, 1, 2] {
        t.round.start_betting().unwrap();
        t.bet("a", 10);
        t.bet("b", 20);
        t.bet("c", 30);
        t.draw_index(winner);
        t.round.new_round().unwrap();
    }

    let history = t.round.history();
    let winners: Vec<&str> = history.iter().map(|h| h.winner_name.as_str()).collect();
    assert_eq!(winners, vec!["c", "b", "a"]);

    let board = t.round.leaderboard();
    assert_eq!(board.len(), 3);
    assert!(board.windows(2).all(|w| w[0].1 >= w[1].1));
    let total: i64 = board.iter().map(|(_, b)| b).sum();
    assert_eq!(total, 3000);
}

#[test]
fn test_back_navigation_discards_bets_keeps_buyout() {
    let mut t = Table::new(&["a", "b"]);
    t.round.start_betting().unwrap();
    t.bet("b", 100);
    t.round.buyout_current().unwrap(); // b buys out, a's bet voided
    t.bet("a", 1);
    t.bet("a", 10);
    assert_eq!(t.round.phase(), Phase::Odds);

    t.round.back().unwrap();
    assert_eq!(t.round.phase(), Phase::Betting);
    assert!(t.round.bets().is_empty());
    assert_eq!(t.balance("b"), 1);
    assert!(t.round.find_by_name("b").unwrap().is_immune);

    t.round.back().unwrap();
    assert_eq!(t.round.phase(), Phase::Setup);
}

#[test]
fn test_storage_outage_during_settlement() {
    let mut t = Table::new(&["a", "b"]);
    t.round.start_betting().unwrap();
    t.bet("a", 100);
    t.bet("a", 100);
    t.round.trigger_draw(&mut crate::harness::Pick(1)).unwrap();

    t.store.set_fail_writes(true);
    let err = t.round.complete_draw().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    assert_eq!(t.round.phase(), Phase::Results);
    assert!(t.store.get(HISTORY_KEY).unwrap().is_none());

    t.store.set_fail_writes(false);
    assert!(t.round.retry_settlement().unwrap().was_applied());
    // b drawn, nobody backed them.
    assert_eq!(t.stored_wallet("a"), Some(900));
    assert_eq!(t.stored_wallet("b"), Some(900));
}

#[test]
fn test_storage_read_outage_falls_back_to_defaults() {
    let store = MemoryStore::new();
    store.set_fail_reads(true);
    let mut t = Table::with_store(&["a", "b"], store);

    assert_eq!(t.balance("a"), 1000);
    assert_eq!(t.round.storage_faults().len(), 2);
    assert!(t.round.leaderboard().is_empty());
    assert!(!t.round.storage_faults().is_empty());
}

#[test]
fn test_reset_data_wipes_ledger() {
    let mut t = Table::new(&["a", "b"]);
    t.round.start_betting().unwrap();
    t.bet("b", 300);
    t.bet("b", 300);
    t.draw_seeded(4);
    t.round.new_round().unwrap();

    t.round.reset_data().unwrap();
    assert!(t.round.history().is_empty());
    assert!(t.round.leaderboard().is_empty());
    assert!(t.round.participants().iter().all(|p| p.balance == 1000));
}
