//! Configuration and encounter files
//!
//! Settings are layered: built-in defaults, then `skirmish.toml` (or the
//! file given with `--config`), then `SKIRMISH_*` environment variables.
//! Encounter files describe a fight to set up: participants, where they
//! stand, and the environment.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::combat::{CombatResult, CombatSession, EnvironmentalEffect, ParticipantId, Position, SessionRules, StatBlock};

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "skirmish.toml";

/// Prefix for environment overrides, e.g. `SKIRMISH_MAX_ROUNDS=20`
pub const ENV_PREFIX: &str = "SKIRMISH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("file not found: {0}")]
    Missing(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Fixed RNG seed for reproducible fights
    pub seed: Option<u64>,
    /// Round limit for automated battles
    pub max_rounds: u32,
    /// JSON Lines file receiving every action
    pub action_log: Option<PathBuf>,
    pub massive_damage: bool,
}

impl Default for Config {
    fn default() -> Self {
        let rules = SessionRules::default();
        Self {
            seed: None,
            max_rounds: rules.max_rounds,
            action_log: None,
            massive_damage: rules.massive_damage,
        }
    }
}

impl Config {
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load layered settings. An explicit path must exist; the default
    /// file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(ConfigError::Missing(p.to_path_buf()));
            }
        }
        let config: Config = Self::figment(path).extract()?;
        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    pub fn rules(&self) -> SessionRules {
        SessionRules {
            massive_damage: self.massive_damage,
            max_rounds: self.max_rounds,
        }
    }
}

/// One combatant in an encounter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterEntry {
    pub stat_block: StatBlock,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub initiative: Option<i32>,
}

/// A fight ready to be set up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<EncounterEntry>,
    #[serde(default)]
    pub environment: Vec<EnvironmentalEffect>,
}

impl Encounter {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Ok(Figment::from(Toml::file(path)).extract()?)
    }

    /// Populate a preparing session; returns the new participant ids in file order
    pub fn populate(&self, session: &mut CombatSession) -> CombatResult<Vec<ParticipantId>> {
        for effect in &self.environment {
            session.add_environmental_effect(effect.clone())?;
        }
        self.participants
            .iter()
            .map(|e| session.add_participant(e.stat_block.clone(), e.position, e.initiative))
            .collect()
    }
}
