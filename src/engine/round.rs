//! Phase controller: one round from setup to results, then around again.
//!
//! ```text
//! Setup → Betting → Odds → Draw → Results → Setup
//!           ↑  ↓      ↓
//!         Setup    Betting        (back, clears bets)
//! ```
//!
//! Every operation checks the phase first and either transitions or
//! returns a `GameError` without touching the round.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::engine::betting::{BetPlaced, BettingSession, BuyoutOutcome};
use crate::engine::draw::draw_winner;
use crate::engine::odds::OddsBoard;
use crate::engine::settlement::{self, BetOutcome, Settlement};
use crate::ports::{Clock, IdGenerator, RandomSource, SystemClock, UuidGenerator};
use crate::storage::{Ledger, StoreError};
use crate::types::{avatar_for, total_pool, Bet, GameError, HistoryEntry, Participant, Phase};

pub type Result<T> = std::result::Result<T, GameError>;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Everything the betting form needs for the current turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnView {
    pub bettor: Participant,
    /// 1-based position in the queue.
    pub step: usize,
    pub total_steps: usize,
    pub progress_pct: f64,
    pub is_rebet: bool,
    pub suggested_bet: i64,
    /// Preset stakes the bettor can afford.
    pub presets: Vec<i64>,
    pub max_bet: i64,
    pub can_buyout: bool,
    /// Bets voided by the buyout just made, for the notification banner.
    pub invalidated_notice: usize,
}

/// Outcome of a finished round, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub winner: Participant,
    pub total_pool: i64,
    pub outcomes: Vec<BetOutcome>,
    /// Whether this process applied the settlement (false if it was
    /// already processed or has not persisted).
    pub settlement_applied: bool,
}

impl ResultsView {
    pub fn winning_bets(&self) -> impl Iterator<Item = &BetOutcome> {
        self.outcomes.iter().filter(|o| o.candidate_id == self.winner.id)
    }
}

/// Serializable picture of the round for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub round_number: u64,
    pub phase: Phase,
    pub participants: Vec<Participant>,
    pub bets: Vec<Bet>,
    pub total_pool: i64,
    pub turn: Option<TurnView>,
    pub odds: Option<OddsBoard>,
    pub results: Option<ResultsView>,
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

pub struct Round {
    settings: GameConfig,
    ledger: Ledger,
    clock: Box<dyn Clock + Send>,
    ids: Box<dyn IdGenerator + Send>,
    phase: Phase,
    participants: Vec<Participant>,
    betting: Option<BettingSession>,
    /// Finalized bets once betting is over.
    bets: Vec<Bet>,
    winner_id: Option<String>,
    settlement: Option<Settlement>,
    round_number: u64,
}

impl Round {
    pub fn new(settings: GameConfig, ledger: Ledger) -> Self {
        Self {
            settings,
            ledger,
            clock: Box::new(SystemClock),
            ids: Box::new(UuidGenerator),
            phase: Phase::Setup,
            participants: Vec::new(),
            betting: None,
            bets: Vec::new(),
            winner_id: None,
            settlement: None,
            round_number: 1,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + Send + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    // -- accessors -----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    pub fn settings(&self) -> &GameConfig {
        &self.settings
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Look a participant up by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.same_name(name))
    }

    /// Bets of the current phase: live during betting, final afterwards.
    pub fn bets(&self) -> &[Bet] {
        match &self.betting {
            Some(session) => session.bets(),
            None => &self.bets,
        }
    }

    pub fn betting(&self) -> Option<&BettingSession> {
        self.betting.as_ref()
    }

    /// Drawn participant; hidden until the round reaches results.
    pub fn winner(&self) -> Option<&Participant> {
        if self.phase != Phase::Results {
            return None;
        }
        self.winner_id.as_deref().and_then(|id| self.participant(id))
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    // -- setup ---------------------------------------------------------------

    /// Add a participant, seeded with their stored balance.
    pub fn add_participant(&mut self, name: &str) -> Result<Participant> {
        self.expect_phase(Phase::Setup)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        if self.find_by_name(name).is_some() {
            return Err(GameError::DuplicateName(name.to_string()));
        }

        let participant = Participant {
            id: self.ids.new_id(),
            name: name.to_string(),
            avatar_tag: avatar_for(self.participants.len()).to_string(),
            balance: self.ledger.balance_of(name, self.settings.initial_balance),
            is_immune: false,
        };
        info!(name, balance = participant.balance, "Participant added");
        self.participants.push(participant.clone());
        Ok(participant)
    }

    pub fn remove_participant(&mut self, id: &str) -> Result<Participant> {
        self.expect_phase(Phase::Setup)?;
        let index = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| GameError::ParticipantNotFound(id.to_string()))?;
        let removed = self.participants.remove(index);
        info!(name = %removed.name, "Participant removed");
        Ok(removed)
    }

    /// Setup → Betting.
    pub fn start_betting(&mut self) -> Result<()> {
        self.expect_phase(Phase::Setup)?;

        let needed = self.settings.min_participants.max(2);
        if self.participants.len() < needed {
            return Err(GameError::NotEnoughParticipants {
                needed,
                have: self.participants.len(),
            });
        }

        self.open_betting();
        info!(
            round = self.round_number,
            participants = self.participants.len(),
            "Betting opened"
        );
        Ok(())
    }

    /// Wipe wallets and history from the ledger. Setup only.
    pub fn reset_data(&mut self) -> Result<()> {
        self.expect_phase(Phase::Setup)?;
        self.ledger.reset_data()?;
        for p in &mut self.participants {
            p.balance = self.settings.initial_balance;
        }
        Ok(())
    }

    // -- betting ---------------------------------------------------------------

    pub fn turn(&self) -> Option<TurnView> {
        let session = self.betting.as_ref()?;
        let bettor = session.current_bettor(&self.participants)?.clone();
        let queue = session.queue();

        let suggested_bet = self.settings.default_bet.min(bettor.balance).max(0);
        let presets = self
            .settings
            .preset_bet_amounts
            .iter()
            .copied()
            .filter(|a| *a <= bettor.balance)
            .collect();

        Some(TurnView {
            step: queue.cursor() + 1,
            total_steps: queue.len(),
            progress_pct: queue.progress_pct(),
            is_rebet: queue.is_rebet_turn(),
            suggested_bet,
            presets,
            max_bet: bettor.balance,
            can_buyout: !bettor.is_immune && bettor.balance >= self.settings.buyout_cost,
            invalidated_notice: session.last_invalidated(),
            bettor,
        })
    }

    /// Current bettor stakes `amount` on `candidate_id`. Betting → Odds once
    /// the queue drains.
    pub fn place_bet(&mut self, candidate_id: &str, amount: i64) -> Result<BetPlaced> {
        self.expect_phase(Phase::Betting)?;
        let session = self.betting.as_mut().ok_or(GameError::WrongPhase {
            expected: Phase::Betting,
            actual: self.phase,
        })?;

        let placed = session.place_bet(&self.participants, candidate_id, amount)?;

        if placed.complete {
            if let Some(session) = self.betting.take() {
                self.bets = session.into_bets();
            }
            self.phase = Phase::Odds;
            info!(
                bets = self.bets.len(),
                pool = total_pool(&self.bets),
                "Betting complete"
            );
        }
        Ok(placed)
    }

    /// Buy immunity for `participant_id` during betting.
    pub fn buyout(&mut self, participant_id: &str) -> Result<BuyoutOutcome> {
        self.expect_phase(Phase::Betting)?;
        let cost = self.settings.buyout_cost;
        let session = self.betting.as_mut().ok_or(GameError::WrongPhase {
            expected: Phase::Betting,
            actual: self.phase,
        })?;
        session.buyout(&mut self.participants, &mut self.ledger, participant_id, cost)
    }

    /// Buyout for whoever's turn it is.
    pub fn buyout_current(&mut self) -> Result<BuyoutOutcome> {
        let id = self
            .turn()
            .map(|t| t.bettor.id)
            .ok_or(GameError::WrongPhase {
                expected: Phase::Betting,
                actual: self.phase,
            })?;
        self.buyout(&id)
    }

    // -- odds & draw -----------------------------------------------------------

    pub fn odds(&self) -> OddsBoard {
        OddsBoard::new(&self.participants, self.bets())
    }

    /// Odds → Draw. The winner is fixed here; revealing it is separate.
    pub fn trigger_draw(&mut self, rng: &mut dyn RandomSource) -> Result<()> {
        self.expect_phase(Phase::Odds)?;
        let winner = draw_winner(&self.participants, rng).ok_or(
            GameError::NotEnoughParticipants {
                needed: 2,
                have: self.participants.len(),
            },
        )?;
        self.winner_id = Some(winner);
        self.phase = Phase::Draw;
        Ok(())
    }

    /// Draw → Results, settling the round.
    ///
    /// The phase moves to results even if settlement fails to persist; the
    /// error is returned and `retry_settlement` can be called.
    pub fn complete_draw(&mut self) -> Result<Settlement> {
        self.expect_phase(Phase::Draw)?;
        self.phase = Phase::Results;
        self.run_settlement()
    }

    /// Re-run settlement for the finished round. Idempotent.
    pub fn retry_settlement(&mut self) -> Result<Settlement> {
        self.expect_phase(Phase::Results)?;
        self.run_settlement()
    }

    pub fn results(&self) -> Option<ResultsView> {
        let winner = self.winner()?.clone();
        let outcomes = settlement::bet_outcomes(&self.participants, &self.bets, &winner.id);
        Some(ResultsView {
            total_pool: total_pool(&self.bets),
            outcomes,
            settlement_applied: self.settlement.as_ref().is_some_and(|s| s.was_applied()),
            winner,
        })
    }

    // -- navigation -------------------------------------------------------------

    /// Step back one phase, discarding that phase's bets.
    pub fn back(&mut self) -> Result<Phase> {
        match self.phase {
            Phase::Betting => {
                self.betting = None;
                self.bets.clear();
                self.phase = Phase::Setup;
            }
            Phase::Odds => {
                self.open_betting();
            }
            other => return Err(GameError::BackNotAllowed(other)),
        }
        info!(phase = %self.phase, "Navigated back");
        Ok(self.phase)
    }

    /// Results → Setup. Balances are reloaded from the ledger, immunity is
    /// lifted and participants get fresh ids.
    pub fn new_round(&mut self) -> Result<()> {
        self.expect_phase(Phase::Results)?;

        for p in &mut self.participants {
            p.id = self.ids.new_id();
            p.balance = self.ledger.balance_of(&p.name, p.balance);
            p.is_immune = false;
        }

        self.betting = None;
        self.bets.clear();
        self.winner_id = None;
        self.settlement = None;
        self.round_number += 1;
        self.phase = Phase::Setup;

        info!(round = self.round_number, "New round");
        Ok(())
    }

    // -- ledger views -------------------------------------------------------------

    pub fn leaderboard(&mut self) -> Vec<(String, i64)> {
        self.ledger.leaderboard()
    }

    pub fn history(&mut self) -> Vec<HistoryEntry> {
        self.ledger.history_newest_first()
    }

    /// Storage faults since the last call.
    pub fn storage_faults(&mut self) -> Vec<StoreError> {
        self.ledger.take_faults()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let odds = matches!(self.phase, Phase::Odds | Phase::Draw | Phase::Results)
            .then(|| self.odds());
        RoundSnapshot {
            round_number: self.round_number,
            phase: self.phase,
            participants: self.participants.clone(),
            bets: self.bets().to_vec(),
            total_pool: total_pool(self.bets()),
            turn: self.turn(),
            odds,
            results: self.results(),
        }
    }

    // -- internals ------------------------------------------------------------------

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn open_betting(&mut self) {
        self.bets.clear();
        self.betting = Some(BettingSession::new(self.participants.len()));
        self.phase = Phase::Betting;
    }

    fn run_settlement(&mut self) -> Result<Settlement> {
        let winner_id = self.winner_id.clone().ok_or(GameError::WrongPhase {
            expected: Phase::Draw,
            actual: self.phase,
        })?;

        let outcome = settlement::settle(
            &mut self.ledger,
            &self.participants,
            &self.bets,
            &winner_id,
            self.clock.as_ref(),
            self.ids.as_mut(),
        );

        match outcome {
            Ok(settled) => {
                if let Settlement::Applied(plan) = &settled {
                    for p in &mut self.participants {
                        if let Some(balance) = plan.balances.get(&p.name) {
                            p.balance = *balance;
                        }
                    }
                }
                self.settlement = Some(settled.clone());
                Ok(settled)
            }
            Err(e) => {
                warn!(error = %e, "Settlement failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Round")
            .field("round_number", &self.round_number)
            .field("phase", &self.phase)
            .field("participants", &self.participants.len())
            .field("bets", &self.bets().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
