//! DAILYBET: office betting game on who gets drawn today
//!
//! Entry point. Loads configuration, initialises structured logging, opens
//! the wallet ledger (or plays in memory when it cannot), and runs the
//! console loop with graceful shutdown.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use dailybet::config::AppConfig;
use dailybet::console::{self, Command, Next};
use dailybet::dashboard::{self, AppState, DashboardState};
use dailybet::engine::Round;
use dailybet::ports::OsRandom;
use dailybet::storage::{JsonFileStore, Ledger, LedgerStore, MemoryStore};

const BANNER: &str = r#"
 ____        _ _       ____       _
|  _ \  __ _(_) |_   _| __ )  ___| |_
| | | |/ _` | | | | | |  _ \ / _ \ __|
| |_| | (_| | | | |_| | |_) |  __/ |_
|____/ \__,_|_|_|\__, |____/ \___|\__|
                 |___/
  Who gets drawn today? Place your bets.
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        ledger = %cfg.storage.ledger_path,
        initial_balance = cfg.game.initial_balance,
        buyout_cost = cfg.game.buyout_cost,
        "DAILYBET starting up"
    );

    let mut round = Round::new(cfg.game.clone(), Ledger::new(open_store(&cfg)));
    let mut rng = OsRandom::default();

    let dashboard = if cfg.dashboard.enabled {
        let state: AppState = Arc::new(DashboardState::new(round.snapshot()));
        match dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port).await {
            Ok(()) => Some(state),
            Err(e) => {
                warn!(error = %e, "Dashboard disabled");
                None
            }
        }
    } else {
        None
    };
    publish(&dashboard, &mut round).await;

    println!("{}", console::HELP);
    prompt(&round);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to read stdin");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    prompt(&round);
                    continue;
                }

                let reply = match line.parse::<Command>() {
                    Ok(command) => console::execute(&mut round, command, &mut rng),
                    Err(e) => {
                        println!("{e}");
                        prompt(&round);
                        continue;
                    }
                };
                print_lines(&reply.lines);

                match reply.next {
                    Next::Quit => break,
                    Next::Spin => {
                        publish(&dashboard, &mut round).await;
                        tokio::time::sleep(Duration::from_secs(cfg.game.spin_secs)).await;
                        print_lines(&console::reveal(&mut round).lines);
                    }
                    Next::Continue => {}
                }

                publish(&dashboard, &mut round).await;
                prompt(&round);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(round = round.round_number(), phase = %round.phase(), "DAILYBET shut down cleanly.");
    Ok(())
}

/// Ledger file, or an in-memory store if the file cannot be used.
fn open_store(cfg: &AppConfig) -> Box<dyn LedgerStore> {
    match JsonFileStore::open(&cfg.storage.ledger_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(
                path = %cfg.storage.ledger_path,
                error = %e,
                "Ledger unavailable, balances will not be saved this session"
            );
            println!("warning: ledger unavailable ({e}); playing without saving");
            Box::new(MemoryStore::new())
        }
    }
}

async fn publish(dashboard: &Option<AppState>, round: &mut Round) {
    if let Some(state) = dashboard {
        state
            .publish(round.snapshot(), round.leaderboard(), round.history())
            .await;
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn prompt(round: &Round) {
    print!("{}", console::render_prompt(round));
    let _ = std::io::stdout().flush();
}

/// Initialise the `tracing` subscriber.
///
/// Logs go to stderr so they do not interleave with the console output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dailybet=warn"));

    let json_logging = std::env::var("DAILYBET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
