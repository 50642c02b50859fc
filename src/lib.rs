//! skirmish - tabletop combat adjudicator
//!
//! Runs turn-based encounters: initiative, attacks, spells, conditions,
//! environment, death saves, and a report at the end.

pub mod api;
pub mod combat;
pub mod config;

pub use api::{CombatRequest, CombatResponse, CombatService, ResponseBody};
pub use config::{Config, ConfigError, Encounter, EncounterEntry};
