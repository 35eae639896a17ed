//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so a partial (or empty) file still yields a
//! playable game.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::storage::file::DEFAULT_LEDGER_FILE;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

/// Rules of the game.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Balance given to a name the ledger has never seen.
    pub initial_balance: i64,
    /// Price of immunity for one round.
    pub buyout_cost: i64,
    /// Suggested stake, capped at the bettor's balance.
    pub default_bet: i64,
    pub preset_bet_amounts: Vec<i64>,
    pub min_participants: usize,
    /// Cosmetic pause between starting the draw and revealing the winner.
    pub spin_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000,
            buyout_cost: 999,
            default_bet: 100,
            preset_bet_amounts: vec![10, 50, 100, 200, 500],
            min_participants: 2,
            spin_secs: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub ledger_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: DEFAULT_LEDGER_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Like `load`, but a missing file means defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let game = &self.game;
        anyhow::ensure!(game.initial_balance >= 0, "initial_balance must not be negative");
        anyhow::ensure!(game.buyout_cost > 0, "buyout_cost must be positive");
        anyhow::ensure!(game.default_bet > 0, "default_bet must be positive");
        anyhow::ensure!(
            game.preset_bet_amounts.iter().all(|a| *a > 0),
            "preset_bet_amounts must be positive"
        );
        anyhow::ensure!(game.min_participants >= 2, "min_participants must be at least 2");
        Ok(())
    }
}
