//! Dashboard API route handlers.
//!
//! All endpoints return JSON built from the latest published snapshot. The
//! console loop owns the round; the dashboard never mutates it.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::odds::OddsBoard;
use crate::engine::round::RoundSnapshot;
use crate::types::HistoryEntry;

/// History entries returned by `/api/history`.
const HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub round: RwLock<RoundSnapshot>,
    pub leaderboard: RwLock<Vec<(String, i64)>>,
    /// Newest first.
    pub history: RwLock<Vec<HistoryEntry>>,
    pub updated_at: RwLock<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new(initial: RoundSnapshot) -> Self {
        Self {
            round: RwLock::new(initial),
            leaderboard: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            updated_at: RwLock::new(Utc::now()),
        }
    }

    /// Replace everything the dashboard serves.
    pub async fn publish(
        &self,
        round: RoundSnapshot,
        leaderboard: Vec<(String, i64)>,
        history: Vec<HistoryEntry>,
    ) {
        *self.round.write().await = round;
        *self.leaderboard.write().await = leaderboard;
        *self.history.write().await = history;
        *self.updated_at.write().await = Utc::now();
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RoundResponse {
    #[serde(flatten)]
    pub round: RoundSnapshot,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub name: String,
    pub balance: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/round
pub async fn get_round(State(state): State<AppState>) -> Json<RoundResponse> {
    let round = state.round.read().await.clone();
    let updated_at = *state.updated_at.read().await;
    Json(RoundResponse { round, updated_at })
}

/// GET /api/odds (404 until betting has closed)
pub async fn get_odds(State(state): State<AppState>) -> Result<Json<OddsBoard>, StatusCode> {
    let round = state.round.read().await;
    round.odds.clone().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/leaderboard
pub async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardRow>> {
    let board = state.leaderboard.read().await;
    Json(
        board
            .iter()
            .enumerate()
            .map(|(i, (name, balance))| LeaderboardRow {
                rank: i + 1,
                name: name.clone(),
                balance: *balance,
            })
            .collect(),
    )
}

/// GET /api/history
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let history = state.history.read().await;
    Json(history.iter().take(HISTORY_LIMIT).cloned().collect())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::engine::round::Round;
    use crate::storage::Ledger;

    fn fresh_state() -> AppState {
        let round = Round::new(GameConfig::default(), Ledger::in_memory());
        Arc::new(DashboardState::new(round.snapshot()))
    }

    #[tokio::test]
    async fn test_get_round_initial() {
        let Json(resp) = get_round(State(fresh_state())).await;
        assert_eq!(resp.round.round_number, 1);
        assert!(resp.round.participants.is_empty());
    }

    #[tokio::test]
    async fn test_get_odds_missing_before_betting_closes() {
        let err = get_odds(State(fresh_state())).await.unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_leaderboard_ranks() {
        let state = fresh_state();
        let round = state.round.read().await.clone();
        state
            .publish(round, vec![("bob".into(), 1200), ("al".into(), 800)], Vec::new())
            .await;

        let Json(rows) = get_leaderboard(State(state)).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].name, "bob");
        assert_eq!(rows[1].balance, 800);
    }

    #[test]
    fn test_round_response_flattens_snapshot() {
        let round = Round::new(GameConfig::default(), Ledger::in_memory());
        let resp = RoundResponse {
            round: round.snapshot(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["phase"], "Setup");
        assert!(json["updated_at"].is_string());
    }
}
