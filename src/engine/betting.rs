//! Betting queue: who bets next, and what a buyout does to the queue.
//!
//! The queue holds participant indices and only ever grows. A cursor walks
//! it front to back; betting is over once the cursor passes the last entry.
//! A buyout removes every bet placed on the buyer and appends each affected
//! bettor to the tail, so each invalidated bet costs exactly one extra turn.

use tracing::{debug, info};

use crate::storage::Ledger;
use crate::types::{total_pool, Bet, GameError, Participant, Phase};

pub type Result<T> = std::result::Result<T, GameError>;

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Append-only turn order with a monotonic cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BettingQueue {
    entries: Vec<usize>,
    cursor: usize,
    original_len: usize,
}

impl BettingQueue {
    /// One turn per participant, in participant order.
    pub fn new(participant_count: usize) -> Self {
        Self {
            entries: (0..participant_count).collect(),
            cursor: 0,
            original_len: participant_count,
        }
    }

    /// Participant index whose turn it is.
    pub fn current(&self) -> Option<usize> {
        self.entries.get(self.cursor).copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    /// Turns still owed, including the current one.
    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.cursor)
    }

    /// Past the first lap: the current turn replaces an invalidated bet.
    pub fn is_rebet_turn(&self) -> bool {
        self.cursor >= self.original_len
    }

    /// Share of turns already taken, 0–100.
    pub fn progress_pct(&self) -> f64 {
        if self.entries.is_empty() {
            return 100.0;
        }
        self.cursor as f64 / self.entries.len() as f64 * 100.0
    }

    /// Move past the current turn. Returns true when the queue is drained.
    pub fn advance(&mut self) -> bool {
        if !self.is_complete() {
            self.cursor += 1;
        }
        self.is_complete()
    }

    /// Give `participant_index` another turn at the back of the line.
    pub fn requeue(&mut self, participant_index: usize) {
        self.entries.push(participant_index);
    }
}

/// Functional form of a single turn: record `bet`, step the cursor, and
/// report whether the queue is drained.
pub fn advance(queue: &[usize], index: usize, bets: &[Bet], bet: Bet) -> (Vec<Bet>, usize, bool) {
    let mut new_bets = bets.to_vec();
    new_bets.push(bet);
    let new_index = (index + 1).min(queue.len());
    (new_bets, new_index, new_index >= queue.len())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Result of an accepted bet.
#[derive(Debug, Clone)]
pub struct BetPlaced {
    pub bet: Bet,
    /// The queue is drained; odds can be shown.
    pub complete: bool,
}

/// Result of an accepted buyout.
#[derive(Debug, Clone)]
pub struct BuyoutOutcome {
    pub participant_id: String,
    pub new_balance: i64,
    /// Bets removed because they targeted the buyer, in list order.
    pub invalidated: Vec<Bet>,
}

/// Queue plus the bets collected so far in the betting phase.
#[derive(Debug, Clone)]
pub struct BettingSession {
    queue: BettingQueue,
    bets: Vec<Bet>,
    /// Bets voided by the most recent buyout, cleared by the next bet.
    last_invalidated: usize,
}

impl BettingSession {
    pub fn new(participant_count: usize) -> Self {
        Self {
            queue: BettingQueue::new(participant_count),
            bets: Vec::new(),
            last_invalidated: 0,
        }
    }

    pub fn queue(&self) -> &BettingQueue {
        &self.queue
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn into_bets(self) -> Vec<Bet> {
        self.bets
    }

    pub fn is_complete(&self) -> bool {
        self.queue.is_complete()
    }

    pub fn last_invalidated(&self) -> usize {
        self.last_invalidated
    }

    pub fn pool(&self) -> i64 {
        total_pool(&self.bets)
    }

    /// Participant whose turn it is.
    pub fn current_bettor<'a>(&self, participants: &'a [Participant]) -> Option<&'a Participant> {
        self.queue.current().and_then(|i| participants.get(i))
    }

    /// Place the current bettor's stake on `candidate_id`.
    pub fn place_bet(
        &mut self,
        participants: &[Participant],
        candidate_id: &str,
        amount: i64,
    ) -> Result<BetPlaced> {
        let bettor = self.current_bettor(participants).ok_or(GameError::WrongPhase {
            expected: Phase::Betting,
            actual: Phase::Odds,
        })?;

        if amount <= 0 {
            return Err(GameError::InvalidAmount(amount));
        }
        if amount > bettor.balance {
            return Err(GameError::InsufficientFunds {
                needed: amount,
                available: bettor.balance,
            });
        }

        let candidate = participants
            .iter()
            .find(|p| p.id == candidate_id)
            .ok_or_else(|| GameError::ParticipantNotFound(candidate_id.to_string()))?;
        if candidate.is_immune {
            return Err(GameError::ImmuneCandidate(candidate.name.clone()));
        }

        let bet = Bet {
            bettor_id: bettor.id.clone(),
            candidate_id: candidate.id.clone(),
            amount,
        };
        self.bets.push(bet.clone());
        self.last_invalidated = 0;
        let complete = self.queue.advance();

        info!(
            bettor = %bettor.name,
            candidate = %candidate.name,
            amount,
            remaining = self.queue.remaining(),
            "Bet placed"
        );

        Ok(BetPlaced { bet, complete })
    }

    /// Buy immunity for `participant_id`.
    ///
    /// The cost is debited from the ledger first; if that write fails
    /// nothing else changes. The cursor does not move.
    pub fn buyout(
        &mut self,
        participants: &mut [Participant],
        ledger: &mut Ledger,
        participant_id: &str,
        cost: i64,
    ) -> Result<BuyoutOutcome> {
        if self.queue.is_complete() {
            return Err(GameError::WrongPhase {
                expected: Phase::Betting,
                actual: Phase::Odds,
            });
        }

        let buyer = participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| GameError::ParticipantNotFound(participant_id.to_string()))?;

        if buyer.is_immune {
            return Err(GameError::AlreadyImmune(buyer.name.clone()));
        }
        if buyer.balance < cost {
            return Err(GameError::InsufficientFunds {
                needed: cost,
                available: buyer.balance,
            });
        }

        let new_balance = buyer.balance - cost;
        ledger.set_balance(&buyer.name, new_balance)?;
        buyer.balance = new_balance;
        buyer.is_immune = true;
        let buyer_name = buyer.name.clone();

        let (invalidated, kept): (Vec<Bet>, Vec<Bet>) = std::mem::take(&mut self.bets)
            .into_iter()
            .partition(|b| b.candidate_id == participant_id);
        self.bets = kept;

        for bet in &invalidated {
            if let Some(index) = participants.iter().position(|p| p.id == bet.bettor_id) {
                self.queue.requeue(index);
                debug!(bettor = %participants[index].name, "Bettor re-queued");
            }
        }
        self.last_invalidated = invalidated.len();

        info!(
            participant = %buyer_name,
            cost,
            new_balance,
            invalidated = invalidated.len(),
            queue_len = self.queue.len(),
            "Buyout accepted"
        );

        Ok(BuyoutOutcome {
            participant_id: participant_id.to_string(),
            new_balance,
            invalidated,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
