//! Combat report
//!
//! A pure fold over a session's action stream plus the final state of its
//! participants. Building a report never touches the session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::damage::DamageType;
use super::log::{ActionType, CombatAction};
use super::participant::{CombatParticipant, ParticipantId};
use super::stats::Side;

/// How a participant ended the fight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Active,
    Stable,
    Dying,
    Dead,
}

impl FinalStatus {
    fn of(p: &CombatParticipant) -> Self {
        if p.is_dead {
            FinalStatus::Dead
        } else if p.is_active {
            FinalStatus::Active
        } else if p.is_stable {
            FinalStatus::Stable
        } else {
            FinalStatus::Dying
        }
    }
}

/// Per-participant totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub name: String,
    pub side: Side,
    pub damage_dealt: i32,
    pub damage_taken: i32,
    pub attacks_made: u32,
    pub attacks_hit: u32,
    pub critical_hits: u32,
    pub hp_start: i32,
    pub hp_end: i32,
    pub status: FinalStatus,
}

impl ParticipantSummary {
    pub fn hit_rate(&self) -> f64 {
        if self.attacks_made == 0 {
            0.0
        } else {
            self.attacks_hit as f64 / self.attacks_made as f64
        }
    }
}

/// Who won
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The only side with active survivors, if exactly one has any
    pub victors: Option<Side>,
    pub survivors: Vec<ParticipantId>,
    pub casualties: Vec<ParticipantId>,
}

/// Summary statistics for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatReport {
    pub session_id: Uuid,
    pub name: String,
    pub total_rounds: u32,
    pub total_turns: u32,
    pub total_actions: usize,
    /// Damage dealt by participants
    pub total_damage_dealt: i32,
    /// Damage received from any source, hazards included
    pub total_damage_received: i32,
    pub damage_by_type: BTreeMap<DamageType, i32>,
    pub action_counts: BTreeMap<ActionType, u32>,
    pub spells_cast: BTreeMap<String, u32>,
    pub participants: Vec<ParticipantSummary>,
    pub outcome: Outcome,
}

impl CombatReport {
    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantSummary> {
        self.participants.iter().find(|p| p.id == id)
    }
}

/// Fold the action stream and final participant states into a report
pub fn build_report<'a>(
    session_id: Uuid,
    name: &str,
    actions: &[CombatAction],
    participants: impl IntoIterator<Item = &'a CombatParticipant>,
) -> CombatReport {
    let mut summaries: BTreeMap<ParticipantId, ParticipantSummary> = participants
        .into_iter()
        .map(|p| {
            (
                p.id,
                ParticipantSummary {
                    id: p.id,
                    name: p.name().to_string(),
                    side: p.side,
                    damage_dealt: 0,
                    damage_taken: 0,
                    attacks_made: 0,
                    attacks_hit: 0,
                    critical_hits: 0,
                    hp_start: p.starting_hp,
                    hp_end: p.current_hp,
                    status: FinalStatus::of(p),
                },
            )
        })
        .collect();

    let mut report = CombatReport {
        session_id,
        name: name.to_string(),
        total_rounds: actions.iter().map(|a| a.round).max().unwrap_or(0),
        total_turns: 0,
        total_actions: actions.len(),
        total_damage_dealt: 0,
        total_damage_received: 0,
        damage_by_type: BTreeMap::new(),
        action_counts: BTreeMap::new(),
        spells_cast: BTreeMap::new(),
        participants: Vec::new(),
        outcome: Outcome {
            victors: None,
            survivors: Vec::new(),
            casualties: Vec::new(),
        },
    };

    for action in actions {
        *report.action_counts.entry(action.action_type).or_insert(0) += 1;
        if action.action_type == ActionType::TurnStart {
            report.total_turns += 1;
        }
        if action.action_type.is_spell_cast() {
            if let Some(spell) = &action.name {
                *report.spells_cast.entry(spell.to_lowercase()).or_insert(0) += 1;
            }
        }

        let is_attack_roll = matches!(
            action.action_type,
            ActionType::Attack | ActionType::Reaction | ActionType::Legendary | ActionType::Spell
        ) && action.hit.is_some();
        if is_attack_roll {
            if let Some(s) = action.actor.and_then(|id| summaries.get_mut(&id)) {
                s.attacks_made += 1;
                if action.hit == Some(true) {
                    s.attacks_hit += 1;
                }
                if action.critical {
                    s.critical_hits += 1;
                }
            }
        }

        let Some(amount) = action.damage.filter(|d| *d > 0) else {
            continue;
        };
        if action.target.is_none() {
            continue;
        }
        report.total_damage_received += amount;
        if let Some(dtype) = action.damage_type {
            *report.damage_by_type.entry(dtype).or_insert(0) += amount;
        }
        if let Some(s) = action.target.and_then(|id| summaries.get_mut(&id)) {
            s.damage_taken += amount;
        }
        if let Some(s) = action.actor.and_then(|id| summaries.get_mut(&id)) {
            s.damage_dealt += amount;
            report.total_damage_dealt += amount;
        }
    }

    let surviving_sides: BTreeSet<_> = summaries
        .values()
        .filter(|s| s.status == FinalStatus::Active)
        .map(|s| matches!(s.side, Side::Hostile))
        .collect();
    report.outcome.victors = match surviving_sides.len() {
        1 => summaries
            .values()
            .find(|s| s.status == FinalStatus::Active)
            .map(|s| s.side),
        _ => None,
    };
    for s in summaries.values() {
        if s.status == FinalStatus::Active {
            report.outcome.survivors.push(s.id);
        } else {
            report.outcome.casualties.push(s.id);
        }
    }
    report.participants = summaries.into_values().collect();
    report
}
