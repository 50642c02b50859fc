//! Combat action log
//!
//! Every resolved action produces one immutable [`CombatAction`]. The
//! session keeps them in order and offers each one to an [`ActionSink`].
//! Sinks are best effort: a failed write is logged and dropped, never
//! propagated into the resolution that produced the record.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::damage::DamageType;
use super::participant::ParticipantId;
use super::stats::Ability;

/// What kind of thing happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CombatStart,
    Initiative,
    TurnStart,
    Attack,
    Spell,
    AoeSpell,
    AreaEffect,
    SavingThrow,
    Concentration,
    DeathSave,
    Reaction,
    Legendary,
    Grapple,
    Escape,
    Move,
    Hazard,
    Heal,
    Condition,
    CombatEnd,
}

impl ActionType {
    /// A spell being cast, as opposed to its per-target effects
    pub fn is_spell_cast(&self) -> bool {
        matches!(self, ActionType::Spell | ActionType::AoeSpell)
    }
}

/// One resolved action; never changed after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatAction {
    /// Sequence number within the session, starting at 1
    pub id: u64,
    pub session_id: Uuid,
    pub round: u32,
    pub turn: usize,
    pub actor: Option<ParticipantId>,
    pub actor_name: Option<String>,
    pub target: Option<ParticipantId>,
    pub target_name: Option<String>,
    pub action_type: ActionType,
    /// Attack, spell, or ability name
    pub name: Option<String>,
    pub roll: Option<u32>,
    pub modifier: Option<i32>,
    pub total: Option<i32>,
    pub hit: Option<bool>,
    pub critical: bool,
    pub damage: Option<i32>,
    pub damage_type: Option<DamageType>,
    pub save_ability: Option<Ability>,
    pub save_dc: Option<i32>,
    pub save_roll: Option<i32>,
    pub save_success: Option<bool>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Accumulates the fields of an action before it is sealed
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    action_type: ActionType,
    actor: Option<(ParticipantId, String)>,
    target: Option<(ParticipantId, String)>,
    name: Option<String>,
    roll: Option<u32>,
    modifier: Option<i32>,
    total: Option<i32>,
    hit: Option<bool>,
    critical: bool,
    damage: Option<(i32, Option<DamageType>)>,
    save: Option<(Ability, i32, Option<i32>, bool)>,
    description: String,
}

impl ActionBuilder {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            actor: None,
            target: None,
            name: None,
            roll: None,
            modifier: None,
            total: None,
            hit: None,
            critical: false,
            damage: None,
            save: None,
            description: String::new(),
        }
    }

    pub fn actor(mut self, id: ParticipantId, name: &str) -> Self {
        self.actor = Some((id, name.to_string()));
        self
    }

    pub fn target(mut self, id: ParticipantId, name: &str) -> Self {
        self.target = Some((id, name.to_string()));
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn roll(mut self, roll: u32, modifier: i32, total: i32) -> Self {
        self.roll = Some(roll);
        self.modifier = Some(modifier);
        self.total = Some(total);
        self
    }

    pub fn hit(mut self, hit: bool, critical: bool) -> Self {
        self.hit = Some(hit);
        self.critical = critical;
        self
    }

    pub fn damage(mut self, amount: i32, damage_type: Option<DamageType>) -> Self {
        self.damage = Some((amount, damage_type));
        self
    }

    /// Save ability, DC, rolled total (none on auto-fail), and success
    pub fn save(mut self, ability: Ability, dc: i32, total: Option<i32>, success: bool) -> Self {
        self.save = Some((ability, dc, total, success));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Seal into an immutable record
    pub fn build(self, id: u64, session_id: Uuid, round: u32, turn: usize) -> CombatAction {
        let (actor, actor_name) = split(self.actor);
        let (target, target_name) = split(self.target);
        CombatAction {
            id,
            session_id,
            round,
            turn,
            actor,
            actor_name,
            target,
            target_name,
            action_type: self.action_type,
            name: self.name,
            roll: self.roll,
            modifier: self.modifier,
            total: self.total,
            hit: self.hit,
            critical: self.critical,
            damage: self.damage.map(|(amount, _)| amount),
            damage_type: self.damage.and_then(|(_, t)| t),
            save_ability: self.save.map(|s| s.0),
            save_dc: self.save.map(|s| s.1),
            save_roll: self.save.and_then(|s| s.2),
            save_success: self.save.map(|s| s.3),
            description: self.description,
            timestamp: Utc::now(),
        }
    }
}

fn split(pair: Option<(ParticipantId, String)>) -> (Option<ParticipantId>, Option<String>) {
    match pair {
        Some((id, name)) => (Some(id), Some(name)),
        None => (None, None),
    }
}

/// Errors a sink can report
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives every action a session records
pub trait ActionSink: Send + Sync {
    fn record(&self, action: &CombatAction) -> Result<(), SinkError>;
}

/// Emits each action as a debug trace event
#[derive(Debug, Default)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn record(&self, action: &CombatAction) -> Result<(), SinkError> {
        debug!(
            session = %action.session_id,
            round = action.round,
            turn = action.turn,
            action_type = ?action.action_type,
            "{}",
            action.description
        );
        Ok(())
    }
}

/// Appends actions to a file as JSON Lines
#[derive(Debug)]
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl ActionSink for JsonlSink {
    fn record(&self, action: &CombatAction) -> Result<(), SinkError> {
        let line = serde_json::to_string(action)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}
