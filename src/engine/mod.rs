//! Core engine: betting queue, odds, draw and settlement, driven by the
//! phase controller in `round`.

pub mod betting;
pub mod draw;
pub mod odds;
pub mod round;
pub mod settlement;

pub use round::{ResultsView, Round, RoundSnapshot, TurnView};
