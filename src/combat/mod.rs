//! Combat system module
//!
//! Adjudicates tabletop-style encounters:
//! - Dice notation and injectable rollers
//! - Attack, save and damage resolution with resistances
//! - Conditions, exhaustion and concentration
//! - Terrain, cover, lighting, weather and hazards
//! - Area spells selected by geometry
//! - Turn order, action budgets and death saves
//! - An action log and a post-combat report

mod ai;
mod aoe;
mod conditions;
mod damage;
mod dice;
mod environment;
mod error;
mod log;
mod manager;
mod modifiers;
mod participant;
mod report;
mod resolve;
mod session;
mod stats;

pub use aoe::Point;
pub use conditions::{Condition, ConditionApplication, ConditionDuration, Provenance};
pub use damage::DamageType;
pub use dice::{FixedRoller, RollMode};
pub use environment::{
    Cover, EnvironmentKind, EnvironmentalEffect, Hazard, Lighting, LocalEnvironment, Terrain, Weather,
};
pub use error::{CombatError, CombatResult};
pub use log::{ActionSink, ActionType, CombatAction, JsonlSink, TracingSink};
pub use manager::{CombatManager, SessionSummary};
pub use participant::{CombatParticipant, ParticipantId, Position};
pub use report::{CombatReport, FinalStatus};
pub use session::{
    AoeOutcome, AoeRequest, AttackOutcome, AttackRequest, CombatSession, DeathSaveResult, GrappleOutcome,
    HealOutcome, LegendaryOutcome, LegendaryRequest, MoveOutcome, ReactionOutcome, ReactionRequest, SaveOutcome,
    SaveRequest, SessionRules, SessionSnapshot, SessionStatus, SpellOutcome, SpellRequest,
};
pub use stats::{Ability, AbilityScores, Character, Enemy, EnemyAttack, Item, LegendaryAction, Side, StatBlock, Weapon};
