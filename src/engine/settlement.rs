//! Settlement: turns a finished round into wallet movements and a history
//! entry, exactly once.
//!
//! Every stake is debited from its bettor. Winning stakes split the whole
//! pool pro rata, each share floored to whole currency units; leftover dust
//! stays with the house.
//!
//! Persistence order: settlement marker, then wallets, then history. A
//! failed wallet write rolls the marker back so the round can be retried; a
//! failed history write leaves the marker in place (wallets already moved).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::ports::{Clock, IdGenerator};
use crate::storage::{processed_key, Ledger, StoreError};
use crate::types::{total_pool, Bet, GameError, HistoryEntry, Participant};

pub type Result<T> = std::result::Result<T, GameError>;

// ---------------------------------------------------------------------------
// Per-bet outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BetOutcome {
    pub bettor_id: String,
    pub bettor_name: String,
    pub candidate_id: String,
    pub amount: i64,
    pub payout: i64,
}

impl BetOutcome {
    pub fn profit(&self) -> i64 {
        self.payout - self.amount
    }

    pub fn is_winner(&self) -> bool {
        self.payout > 0
    }
}

/// `floor(amount / on_winner * pool)` in exact integer arithmetic.
pub fn payout_share(amount: i64, on_winner: i64, pool: i64) -> i64 {
    if on_winner <= 0 {
        return 0;
    }
    ((amount as i128 * pool as i128) / on_winner as i128) as i64
}

/// What each bet returned, in bet order. Pure; used for display too.
pub fn bet_outcomes(participants: &[Participant], bets: &[Bet], winner_id: &str) -> Vec<BetOutcome> {
    let pool = total_pool(bets);
    let on_winner: i64 = bets
        .iter()
        .filter(|b| b.candidate_id == winner_id)
        .map(|b| b.amount)
        .sum();

    bets.iter()
        .filter_map(|bet| {
            let bettor = participants.iter().find(|p| p.id == bet.bettor_id)?;
            let payout = if bet.candidate_id == winner_id {
                payout_share(bet.amount, on_winner, pool)
            } else {
                0
            };
            Some(BetOutcome {
                bettor_id: bet.bettor_id.clone(),
                bettor_name: bettor.name.clone(),
                candidate_id: bet.candidate_id.clone(),
                amount: bet.amount,
                payout,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Everything a settlement will write, computed up front.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementPlan {
    pub key: String,
    pub total_pool: i64,
    pub outcomes: Vec<BetOutcome>,
    /// New balance per bettor name.
    pub balances: BTreeMap<String, i64>,
    /// Change per bettor name (new minus starting balance).
    pub deltas: BTreeMap<String, i64>,
    pub history: HistoryEntry,
}

impl SettlementPlan {
    pub fn total_paid(&self) -> i64 {
        self.outcomes.iter().map(|o| o.payout).sum()
    }

    /// Floor-rounding remainder kept by the house.
    pub fn dust(&self) -> i64 {
        if self.outcomes.iter().any(|o| o.is_winner()) {
            self.total_pool - self.total_paid()
        } else {
            0
        }
    }
}

/// Compute the plan against the given wallet snapshot.
///
/// Starting balances come from `wallets` (which already reflect buyouts);
/// bettors the ledger has never seen start from their in-memory balance.
pub fn plan(
    participants: &[Participant],
    bets: &[Bet],
    winner_id: &str,
    wallets: &BTreeMap<String, i64>,
    history_id: String,
    date: DateTime<Utc>,
) -> Result<SettlementPlan> {
    let winner = participants
        .iter()
        .find(|p| p.id == winner_id)
        .ok_or_else(|| GameError::ParticipantNotFound(winner_id.to_string()))?;

    let pool = total_pool(bets);
    let outcomes = bet_outcomes(participants, bets, winner_id);

    let mut starting: BTreeMap<String, i64> = BTreeMap::new();
    let mut balances: BTreeMap<String, i64> = BTreeMap::new();
    for outcome in &outcomes {
        let fallback = participants
            .iter()
            .find(|p| p.id == outcome.bettor_id)
            .map(|p| p.balance)
            .unwrap_or_default();
        let start = wallets.get(&outcome.bettor_name).copied().unwrap_or(fallback);
        starting.entry(outcome.bettor_name.clone()).or_insert(start);

        let balance = balances.entry(outcome.bettor_name.clone()).or_insert(start);
        *balance += outcome.profit();
    }

    let deltas = balances
        .iter()
        .map(|(name, new)| (name.clone(), new - starting[name]))
        .collect();

    Ok(SettlementPlan {
        key: processed_key(winner_id, pool, bets.len()),
        total_pool: pool,
        outcomes,
        balances,
        deltas,
        history: HistoryEntry {
            id: history_id,
            date,
            winner_name: winner.name.clone(),
            winner_avatar_tag: winner.avatar_tag.clone(),
            winner_id: winner.id.clone(),
            total_pool: pool,
        },
    })
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub enum Settlement {
    /// Ledger updated by this call.
    Applied(SettlementPlan),
    /// A previous call already settled this round; nothing written.
    AlreadyProcessed { key: String },
}

impl Settlement {
    pub fn was_applied(&self) -> bool {
        matches!(self, Settlement::Applied(_))
    }

    pub fn key(&self) -> &str {
        match self {
            Settlement::Applied(plan) => &plan.key,
            Settlement::AlreadyProcessed { key } => key,
        }
    }
}

/// Settle a completed round against the ledger, at most once per key.
pub fn settle(
    ledger: &mut Ledger,
    participants: &[Participant],
    bets: &[Bet],
    winner_id: &str,
    clock: &dyn Clock,
    ids: &mut dyn IdGenerator,
) -> Result<Settlement> {
    let key = processed_key(winner_id, total_pool(bets), bets.len());
    if ledger.is_processed(&key)? {
        info!(key = %key, "Round already settled, skipping");
        return Ok(Settlement::AlreadyProcessed { key });
    }

    let mut wallets = ledger.try_wallets()?;
    let plan = plan(participants, bets, winner_id, &wallets, ids.new_id(), clock.now())?;

    ledger.mark_processed(&plan.key)?;

    wallets.extend(plan.balances.iter().map(|(n, b)| (n.clone(), *b)));
    if let Err(e) = ledger.write_wallets(&wallets) {
        if let Err(rollback) = ledger.remove_marker(&plan.key) {
            error!(key = %plan.key, error = %rollback, "Could not roll back settlement marker");
        }
        return Err(incomplete(&plan, "wallets", e));
    }

    if let Err(e) = ledger.append_history(plan.history.clone()) {
        return Err(incomplete(&plan, "history", e));
    }

    info!(
        key = %plan.key,
        winner = %plan.history.winner_name,
        pool = plan.total_pool,
        paid = plan.total_paid(),
        dust = plan.dust(),
        bettors = plan.balances.len(),
        "Round settled"
    );

    Ok(Settlement::Applied(plan))
}

fn incomplete(plan: &SettlementPlan, stage: &'static str, source: StoreError) -> GameError {
    warn!(
        key = %plan.key,
        stage,
        balances = ?plan.balances,
        winner = %plan.history.winner_name,
        "Settlement not fully persisted; manual recovery needed"
    );
    GameError::SettlementIncomplete {
        key: plan.key.clone(),
        stage,
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
