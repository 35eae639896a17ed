//! Odds calculator.
//!
//! Pure function of the participant list and the bets placed so far. A
//! candidate's multiplier is the pool divided by the stake riding on them,
//! rounded to cents. Candidates nobody backed get a fixed 99.99 sentinel.

use rust_decimal::prelude::*;
use serde::Serialize;

use crate::types::{total_pool, Bet, OddsEntry, Participant};

/// Multiplier shown for a candidate with no stake on them (99.99).
pub const NO_STAKE_MULTIPLIER: Decimal = Decimal::from_parts(9999, 0, 0, false, 2);

/// Odds for every participant, cheapest multiplier first.
pub fn compute_odds(participants: &[Participant], bets: &[Bet]) -> Vec<OddsEntry> {
    let pool = total_pool(bets);

    let mut entries: Vec<OddsEntry> = participants
        .iter()
        .map(|p| {
            let backing: Vec<&Bet> = bets.iter().filter(|b| b.candidate_id == p.id).collect();
            let wagered: i64 = backing.iter().map(|b| b.amount).sum();
            OddsEntry {
                candidate_id: p.id.clone(),
                total_bets_count: backing.len(),
                amount_wagered: wagered,
                multiplier: multiplier(pool, wagered),
            }
        })
        .collect();

    entries.sort_by(|a, b| a.multiplier.cmp(&b.multiplier));
    entries
}

/// `pool / wagered` to two decimals, or the sentinel when nothing is wagered.
pub fn multiplier(pool: i64, wagered: i64) -> Decimal {
    if wagered <= 0 {
        return NO_STAKE_MULTIPLIER;
    }
    (Decimal::from(pool) / Decimal::from(wagered))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Odds plus the pool they were computed from.
#[derive(Debug, Clone, Serialize)]
pub struct OddsBoard {
    pub total_pool: i64,
    pub entries: Vec<OddsEntry>,
}

impl OddsBoard {
    pub fn new(participants: &[Participant], bets: &[Bet]) -> Self {
        Self {
            total_pool: total_pool(bets),
            entries: compute_odds(participants, bets),
        }
    }

    /// Backed candidate with the lowest multiplier.
    pub fn favorite(&self) -> Option<&OddsEntry> {
        self.entries
            .iter()
            .filter(|e| e.total_bets_count > 0)
            .min_by(|a, b| a.multiplier.cmp(&b.multiplier))
    }

    pub fn underdogs(&self) -> impl Iterator<Item = &OddsEntry> {
        self.entries.iter().filter(|e| e.is_underdog())
    }

    pub fn entry_for(&self, candidate_id: &str) -> Option<&OddsEntry> {
        self.entries.iter().find(|e| e.candidate_id == candidate_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{seeded, RandomSource};
    use crate::types::avatar_for;
    use rust_decimal_macros::dec;

    fn people(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant {
                id: format!("p{i}"),
                name: format!("player{i}"),
                avatar_tag: avatar_for(i).to_string(),
                balance: 1000,
                is_immune: false,
            })
            .collect()
    }

    fn bet(from: &str, on: &str, amount: i64) -> Bet {
        Bet {
            bettor_id: from.to_string(),
            candidate_id: on.to_string(),
            amount,
        }
    }

    #[test]
    fn test_sentinel_value() {
        assert_eq!(NO_STAKE_MULTIPLIER, dec!(99.99));
    }

    #[test]
    fn test_cyclic_bets_even_odds() {
        let ps = people(3);
        let bets = vec![bet("p0", "p1", 100), bet("p1", "p2", 100), bet("p2", "p0", 100)];
        let board = OddsBoard::new(&ps, &bets);

        assert_eq!(board.total_pool, 300);
        for e in &board.entries {
            assert_eq!(e.multiplier, dec!(3.00));
            assert_eq!(e.total_bets_count, 1);
        }
        assert_eq!(board.underdogs().count(), 0);
    }

    #[test]
    fn test_unbacked_candidate_is_underdog() {
        let ps = people(3);
        let bets = vec![bet("p0", "p1", 100), bet("p1", "p1", 50), bet("p2", "p0", 150)];
        let board = OddsBoard::new(&ps, &bets);

        let p2 = board.entry_for("p2").unwrap();
        assert_eq!(p2.multiplier, dec!(99.99));
        assert_eq!(p2.total_bets_count, 0);
        assert!(p2.is_underdog());
        assert_eq!(board.underdogs().count(), 1);

        // Sorted ascending, sentinel last.
        assert_eq!(board.entries.last().unwrap().candidate_id, "p2");
    }

    #[test]
    fn test_favorite_is_lowest_backed_multiplier() {
        let ps = people(3);
        let bets = vec![bet("p0", "p1", 300), bet("p1", "p0", 100), bet("p2", "p1", 100)];
        let board = OddsBoard::new(&ps, &bets);

        // p1: 500/400 = 1.25; p0: 500/100 = 5.00
        assert_eq!(board.entries[0].candidate_id, "p1");
        assert_eq!(board.entries[0].multiplier, dec!(1.25));
        assert_eq!(board.entry_for("p0").unwrap().multiplier, dec!(5.00));
        assert_eq!(board.favorite().unwrap().candidate_id, "p1");
    }

    #[test]
    fn test_no_bets_means_no_favorite() {
        let board = OddsBoard::new(&people(2), &[]);
        assert!(board.favorite().is_none());
        assert!(board.entries.iter().all(|e| e.multiplier == NO_STAKE_MULTIPLIER));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 1000 / 3 = 333.333..., 2 / 3 = 0.666..., 201 / 8 = 25.125
        assert_eq!(multiplier(1000, 3), dec!(333.33));
        assert_eq!(multiplier(1001, 1000), dec!(1.00));
        assert_eq!(multiplier(201, 8), dec!(25.13));
    }

    #[test]
    fn test_weighted_multipliers_recover_pool() {
        let ps = people(5);
        let mut rng = seeded(1234);

        for _ in 0..200 {
            let bets: Vec<Bet> = (0..rng.uniform(12) + 1)
                .map(|i| {
                    let on = format!("p{}", rng.uniform(5));
                    bet(&format!("p{}", i % 5), &on, rng.uniform(500) as i64 + 1)
                })
                .collect();
            let board = OddsBoard::new(&ps, &bets);

            let recovered: Decimal = board
                .entries
                .iter()
                .filter(|e| e.amount_wagered > 0)
                .map(|e| e.multiplier * Decimal::from(e.amount_wagered))
                .sum();
            let pool = Decimal::from(board.total_pool);
            // Each multiplier is off by at most half a cent.
            assert!(
                (recovered - pool).abs() <= pool * dec!(0.005),
                "recovered {recovered} vs pool {pool}"
            );
        }
    }
}
