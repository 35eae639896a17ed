//! Console front end: line commands in, plain text out.
//!
//! Parsing and rendering live here so the binary stays a thin I/O loop.
//! Participants are addressed by name (case-insensitive); ids never reach
//! the terminal.

use std::str::FromStr;

use crate::engine::odds::OddsBoard;
use crate::engine::round::{ResultsView, Round, TurnView};
use crate::ports::RandomSource;
use crate::types::{ErrorKind, GameError, Participant, Phase};

pub const HELP: &str = "\
Commands:
  add <name>            add a participant (setup)
  remove <name>         remove a participant (setup)
  list                  show participants
  start                 open betting (setup)
  bet <name> [amount]   current bettor backs <name>; amount defaults to the suggestion
  buyout [name]         buy immunity (defaults to the current bettor)
  back                  go back one phase, discarding bets
  odds                  show the odds board
  draw                  draw today's unlucky participant (odds)
  retry                 retry a settlement that failed to save (results)
  new                   start a new round (results)
  leaderboard           all-time balances
  history               past rounds, newest first
  reset-data            wipe wallets and history (setup)
  help                  this text
  quit                  exit";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    List,
    Start,
    Bet { candidate: String, amount: Option<i64> },
    Buyout(Option<String>),
    Back,
    Odds,
    Draw,
    Retry,
    New,
    Leaderboard,
    History,
    ResetData,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs a {arg}")]
    MissingArgument {
        command: &'static str,
        arg: &'static str,
    },

    #[error("Not a whole amount: {0}")]
    BadAmount(String),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        let name = |command: &'static str| {
            if rest.is_empty() {
                Err(ParseError::MissingArgument { command, arg: "name" })
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "add" => name("add").map(Command::Add),
            "remove" | "rm" => name("remove").map(Command::Remove),
            "list" | "ls" => Ok(Command::List),
            "start" => Ok(Command::Start),
            "bet" => parse_bet(rest),
            "buyout" => Ok(Command::Buyout((!rest.is_empty()).then(|| rest.to_string()))),
            "back" => Ok(Command::Back),
            "odds" => Ok(Command::Odds),
            "draw" | "spin" => Ok(Command::Draw),
            "retry" => Ok(Command::Retry),
            "new" => Ok(Command::New),
            "leaderboard" | "lb" => Ok(Command::Leaderboard),
            "history" => Ok(Command::History),
            "reset-data" => Ok(Command::ResetData),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// `bet <name> [amount]`. Names may contain spaces, so a trailing integer
/// is taken as the amount.
fn parse_bet(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::MissingArgument {
            command: "bet",
            arg: "candidate name",
        });
    }

    match rest.rsplit_once(char::is_whitespace) {
        Some((candidate, last)) if last.starts_with(|c: char| c.is_ascii_digit() || c == '-') => {
            let amount = last
                .parse::<i64>()
                .map_err(|_| ParseError::BadAmount(last.to_string()))?;
            Ok(Command::Bet {
                candidate: candidate.trim().to_string(),
                amount: Some(amount),
            })
        }
        _ => Ok(Command::Bet {
            candidate: rest.to_string(),
            amount: None,
        }),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// What the I/O loop should do after printing a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue,
    /// The draw is running; wait, then call `reveal`.
    Spin,
    Quit,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub lines: Vec<String>,
    pub next: Next,
}

impl Reply {
    fn text(lines: Vec<String>) -> Self {
        Self {
            lines,
            next: Next::Continue,
        }
    }

    fn line(line: impl Into<String>) -> Self {
        Self::text(vec![line.into()])
    }
}

/// Run one command against the round.
pub fn execute(round: &mut Round, command: Command, rng: &mut dyn RandomSource) -> Reply {
    let mut reply = match run(round, command, rng) {
        Ok(reply) => reply,
        Err(e) => Reply::line(render_error(&e)),
    };
    for fault in round.storage_faults() {
        reply
            .lines
            .push(format!("warning: storage unavailable, using defaults ({fault})"));
    }
    reply
}

/// Finish a running draw and show the results.
pub fn reveal(round: &mut Round) -> Reply {
    let mut lines = Vec::new();
    if let Err(e) = round.complete_draw() {
        lines.push(render_error(&e));
        lines.push("Results are shown but balances were not saved; try 'retry'.".to_string());
    }
    if let Some(results) = round.results() {
        lines.extend(render_results(&results, round.participants()));
    }
    Reply::text(lines)
}

fn run(round: &mut Round, command: Command, rng: &mut dyn RandomSource) -> Result<Reply, GameError> {
    let reply = match command {
        Command::Add(name) => {
            let p = round.add_participant(&name)?;
            Reply::line(format!("Added {p} [{}]", p.avatar_tag))
        }
        Command::Remove(name) => {
            let id = resolve(round, &name)?;
            let p = round.remove_participant(&id)?;
            Reply::line(format!("Removed {}", p.name))
        }
        Command::List => Reply::text(render_participants(round.participants())),
        Command::Start => {
            round.start_betting()?;
            let mut lines = vec!["Betting is open.".to_string()];
            lines.extend(round.turn().map(|t| render_turn(&t)));
            Reply::text(lines)
        }
        Command::Bet { candidate, amount } => {
            let candidate_id = resolve(round, &candidate)?;
            let amount = match amount {
                Some(a) => a,
                None => round.turn().map(|t| t.suggested_bet).unwrap_or_default(),
            };
            let placed = round.place_bet(&candidate_id, amount)?;
            let mut lines = vec![format!("${amount} on {}", display_name(round, &placed.bet.candidate_id))];
            if placed.complete {
                lines.push("All bets are in.".to_string());
                lines.extend(render_odds(&round.odds(), round.participants()));
            } else if let Some(turn) = round.turn() {
                lines.push(render_turn(&turn));
            }
            Reply::text(lines)
        }
        Command::Buyout(name) => {
            let outcome = match name {
                Some(name) => {
                    let id = resolve(round, &name)?;
                    round.buyout(&id)?
                }
                None => round.buyout_current()?,
            };
            let mut lines = vec![format!(
                "{} is immune this round (balance now ${}).",
                display_name(round, &outcome.participant_id),
                outcome.new_balance
            )];
            if !outcome.invalidated.is_empty() {
                lines.push(format!(
                    "{} bet(s) on them were voided; those bettors will bet again.",
                    outcome.invalidated.len()
                ));
            }
            lines.extend(round.turn().map(|t| render_turn(&t)));
            Reply::text(lines)
        }
        Command::Back => {
            let phase = round.back()?;
            let mut lines = vec![format!("Back to {phase}; bets cleared.")];
            lines.extend(round.turn().map(|t| render_turn(&t)));
            Reply::text(lines)
        }
        Command::Odds => Reply::text(render_odds(&round.odds(), round.participants())),
        Command::Draw => {
            round.trigger_draw(rng)?;
            Reply {
                lines: vec!["Drawing...".to_string()],
                next: Next::Spin,
            }
        }
        Command::Retry => {
            let settled = round.retry_settlement()?;
            if settled.was_applied() {
                Reply::line("Settlement saved.")
            } else {
                Reply::line("Round was already settled; nothing to do.")
            }
        }
        Command::New => {
            round.new_round()?;
            let mut lines = vec![format!("Round {}: add or remove people, then 'start'.", round.round_number())];
            lines.extend(render_participants(round.participants()));
            Reply::text(lines)
        }
        Command::Leaderboard => {
            let rows = round.leaderboard();
            if rows.is_empty() {
                Reply::line("No balances yet.")
            } else {
                Reply::text(
                    rows.iter()
                        .enumerate()
                        .map(|(i, (name, balance))| format!("{:>3}. {name:<20} ${balance}", i + 1))
                        .collect(),
                )
            }
        }
        Command::History => {
            let history = round.history();
            if history.is_empty() {
                Reply::line("No rounds played yet.")
            } else {
                Reply::text(history.iter().map(|h| h.to_string()).collect())
            }
        }
        Command::ResetData => {
            round.reset_data()?;
            Reply::line("Wallets and history wiped.")
        }
        Command::Help => Reply::line(HELP),
        Command::Quit => Reply {
            lines: vec!["Bye.".to_string()],
            next: Next::Quit,
        },
    };
    Ok(reply)
}

fn resolve(round: &Round, name: &str) -> Result<String, GameError> {
    round
        .find_by_name(name)
        .map(|p| p.id.clone())
        .ok_or_else(|| GameError::ParticipantNotFound(name.trim().to_string()))
}

fn display_name(round: &Round, id: &str) -> String {
    round
        .participant(id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_error(error: &GameError) -> String {
    let label = match error.kind() {
        ErrorKind::InvalidInput => "error",
        ErrorKind::InsufficientFunds => "insufficient funds",
        ErrorKind::StorageUnavailable => "storage unavailable",
    };
    format!("{label}: {error}")
}

pub fn render_prompt(round: &Round) -> String {
    match round.phase() {
        Phase::Betting => round
            .turn()
            .map(|t| format!("[{}] {}> ", round.phase(), t.bettor.name))
            .unwrap_or_else(|| format!("[{}]> ", round.phase())),
        phase => format!("[{phase}]> "),
    }
}

pub fn render_participants(participants: &[Participant]) -> Vec<String> {
    if participants.is_empty() {
        return vec!["Nobody here yet; 'add <name>' to join.".to_string()];
    }
    participants
        .iter()
        .map(|p| format!("  [{}] {p}", p.initials()))
        .collect()
}

pub fn render_turn(turn: &TurnView) -> String {
    let mut line = format!(
        "[{}/{} {:.0}%] {}'s turn, balance ${}. Suggested ${}",
        turn.step, turn.total_steps, turn.progress_pct, turn.bettor.name, turn.max_bet, turn.suggested_bet
    );
    if !turn.presets.is_empty() {
        let presets: Vec<String> = turn.presets.iter().map(|p| p.to_string()).collect();
        line.push_str(&format!(", presets {}", presets.join("/")));
    }
    if turn.can_buyout {
        line.push_str(", 'buyout' available");
    }
    if turn.is_rebet {
        line.push_str(" (re-bet)");
    }
    line
}

pub fn render_odds(board: &OddsBoard, participants: &[Participant]) -> Vec<String> {
    let mut lines = vec![format!("Pool: ${}", board.total_pool)];
    for entry in &board.entries {
        let Some(p) = participants.iter().find(|p| p.id == entry.candidate_id) else {
            continue;
        };
        let mut line = format!(
            "  {:<20} {:>6.2}x  ${} on {} bet(s)",
            p.name, entry.multiplier, entry.amount_wagered, entry.total_bets_count
        );
        if p.is_immune {
            line.push_str("  [immune]");
        } else if entry.is_underdog() {
            line.push_str("  [underdog]");
        }
        lines.push(line);
    }
    lines
}

pub fn render_results(results: &ResultsView, participants: &[Participant]) -> Vec<String> {
    let mut lines = vec![
        format!("Today's pick: {}!", results.winner.name),
        format!("Pool: ${}", results.total_pool),
    ];
    for outcome in &results.outcomes {
        let candidate = participants
            .iter()
            .find(|p| p.id == outcome.candidate_id)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        lines.push(format!(
            "  {:<20} ${} on {:<20} → ${} ({:+})",
            outcome.bettor_name,
            outcome.amount,
            candidate,
            outcome.payout,
            outcome.profit()
        ));
    }
    let winners: Vec<&str> = results.winning_bets().map(|o| o.bettor_name.as_str()).collect();
    if winners.is_empty() {
        lines.push("Nobody backed the winner; the house keeps the pool.".to_string());
    } else {
        lines.push(format!("Winners: {}", winners.join(", ")));
    }
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
