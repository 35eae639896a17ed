//! Draw engine.
//!
//! Picks the unlucky participant uniformly among those without immunity.
//! If everybody bought out, everybody is back in the hat.

use tracing::info;

use crate::ports::RandomSource;
use crate::types::Participant;

/// Participants the draw may pick.
pub fn eligible(participants: &[Participant]) -> Vec<&Participant> {
    let open: Vec<&Participant> = participants.iter().filter(|p| !p.is_immune).collect();
    if open.is_empty() {
        participants.iter().collect()
    } else {
        open
    }
}

/// Id of the drawn participant, or `None` for an empty list.
pub fn draw_winner(participants: &[Participant], rng: &mut dyn RandomSource) -> Option<String> {
    let pool = eligible(participants);
    if pool.is_empty() {
        return None;
    }

    let winner = pool[rng.uniform(pool.len())];
    info!(
        winner = %winner.name,
        eligible = pool.len(),
        total = participants.len(),
        "Winner drawn"
    );
    Some(winner.id.clone())
}
