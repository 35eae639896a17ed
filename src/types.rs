//! Shared types for the DAILYBET engine.
//!
//! These types form the data model used across all modules. The engine,
//! storage and dashboard layers depend on them without depending on each
//! other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::StoreError;

/// Avatar palette, handed out by join position.
pub const AVATAR_TAGS: &[&str] = &[
    "red", "orange", "amber", "green", "emerald", "teal", "cyan", "sky", "blue", "indigo",
    "violet", "purple", "fuchsia", "pink", "rose",
];

/// Avatar tag for the participant joining at `position`.
pub fn avatar_for(position: usize) -> &'static str {
    AVATAR_TAGS[position % AVATAR_TAGS.len()]
}

// ---------------------------------------------------------------------------
// Participants & bets
// ---------------------------------------------------------------------------

/// A player in the current round.
///
/// `id` is regenerated every round; `name` is the durable key into the
/// wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub avatar_tag: String,
    /// In-memory copy of the ledger balance.
    pub balance: i64,
    pub is_immune: bool,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (${})", self.name, self.balance)?;
        if self.is_immune {
            write!(f, " [immune]")?;
        }
        Ok(())
    }
}

impl Participant {
    /// Two-letter badge shown next to the name.
    pub fn initials(&self) -> String {
        self.name.chars().take(2).collect::<String>().to_uppercase()
    }

    pub fn same_name(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.trim().to_lowercase()
    }
}

/// A stake placed by `bettor_id` on `candidate_id` being drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub bettor_id: String,
    pub candidate_id: String,
    pub amount: i64,
}

/// Sum of all bet amounts.
pub fn total_pool(bets: &[Bet]) -> i64 {
    bets.iter().map(|b| b.amount).sum()
}

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// Derived odds for a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsEntry {
    pub candidate_id: String,
    pub total_bets_count: usize,
    pub amount_wagered: i64,
    pub multiplier: Decimal,
}

impl OddsEntry {
    /// Nobody has backed this candidate.
    pub fn is_underdog(&self) -> bool {
        self.total_bets_count == 0
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One completed round, as persisted in the ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub winner_name: String,
    pub winner_avatar_tag: String,
    pub winner_id: String,
    pub total_pool: i64,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} drawn (pool ${})",
            self.date.format("%Y-%m-%d %H:%M"),
            self.winner_name,
            self.total_pool,
        )
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Setup,
    Betting,
    Odds,
    Draw,
    Results,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "SETUP"),
            Phase::Betting => write!(f, "BETTING"),
            Phase::Odds => write!(f, "ODDS"),
            Phase::Draw => write!(f, "DRAW"),
            Phase::Results => write!(f, "RESULTS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Coarse classification of a rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InsufficientFunds,
    StorageUnavailable,
}

/// Reasons a round operation was refused. A refused operation leaves the
/// round untouched.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Action not allowed in {actual} (needs {expected})")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Need at least {needed} participants, have {have}")]
    NotEnoughParticipants { needed: usize, have: usize },

    #[error("Participant name is empty")]
    EmptyName,

    #[error("Participant name already taken: {0}")]
    DuplicateName(String),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Bet amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance: need ${needed}, have ${available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("Candidate is immune: {0}")]
    ImmuneCandidate(String),

    #[error("Participant already immune: {0}")]
    AlreadyImmune(String),

    #[error("Cannot go back from {0}")]
    BackNotAllowed(Phase),

    #[error("Betting still open: {remaining} turn(s) left")]
    BettingIncomplete { remaining: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Settlement {key} not persisted ({stage}): {source}")]
    SettlementIncomplete {
        key: String,
        stage: &'static str,
        #[source]
        source: StoreError,
    },
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            GameError::Storage(_) | GameError::SettlementIncomplete { .. } => {
                ErrorKind::StorageUnavailable
            }
            _ => ErrorKind::InvalidInput,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
