//! Participant resource model
//!
//! One `CombatParticipant` per combatant in a session. It owns everything
//! that changes during a fight:
//! - hit points and the active/stable/dead flags
//! - the per-turn action budget
//! - conditions, exhaustion and concentration
//! - the death-save counters
//! - legendary-action points and the enemy spell-slot ledger
//! - position and the environment at that position
//!
//! Methods here enforce the participant's own invariants. Turn order and
//! cross-participant effects live in the session.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::aoe::Point;
use super::conditions::{self, Condition, ConditionSet};
use super::damage::DamageProfile;
use super::environment::{Cover, LocalEnvironment};
use super::error::{CombatError, CombatResult};
use super::stats::{Combatant, Side, StatBlock};

/// Stable participant identity; lower ids win initiative ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position on the battle map, in feet
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// What has been spent this turn
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TurnBudget {
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub reaction_used: bool,
    /// Feet of movement already spent
    pub movement_used: f64,
}

/// Death saving throw counters, each in 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

impl DeathSaves {
    fn add_success(&mut self, n: u8) {
        self.successes = (self.successes + n).min(3);
    }

    fn add_failure(&mut self, n: u8) {
        self.failures = (self.failures + n).min(3);
    }
}

/// Result of a single death save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveOutcome {
    pub roll: u32,
    pub success: bool,
    pub successes: u8,
    pub failures: u8,
    pub is_stable: bool,
    pub is_dead: bool,
    /// Natural 20: back on their feet at 1 HP
    pub revived: bool,
}

/// A spell being concentrated on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concentration {
    pub spell: String,
    pub since_round: u32,
}

/// What `take_damage` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTaken {
    pub amount: i32,
    pub hp_before: i32,
    pub hp_after: i32,
    /// Went from positive HP to 0 with this hit
    pub dropped: bool,
    pub died: bool,
    /// DC of the concentration save owed, if still conscious and concentrating
    pub concentration_dc: Option<i32>,
}

/// Mutable combat state of one creature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatParticipant {
    pub id: ParticipantId,
    pub stat_block: StatBlock,
    pub side: Side,
    pub initiative: Option<i32>,
    pub starting_hp: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    pub is_active: bool,
    pub is_stable: bool,
    pub is_dead: bool,
    pub budget: TurnBudget,
    pub conditions: ConditionSet,
    pub exhaustion: u8,
    pub concentration: Option<Concentration>,
    pub death_saves: DeathSaves,
    /// Round of the last death save, to allow one per round
    pub last_death_save_round: Option<u32>,
    pub legendary_actions_max: u32,
    pub legendary_actions_remaining: u32,
    /// Enemy spell name (lowercase) to remaining uses; at-will spells never appear
    pub spell_slots: BTreeMap<String, u32>,
    pub position: Position,
    /// Derived from the session's effects at `position`
    pub environment: LocalEnvironment,
    /// Explicit cover, overriding area-based cover
    pub cover_override: Option<Cover>,
    pub grappling: Option<ParticipantId>,
    pub grappled_by: Option<ParticipantId>,
    pub damage_profile: DamageProfile,
}

impl CombatParticipant {
    pub fn new(id: ParticipantId, stat_block: StatBlock) -> Self {
        let max_hp = stat_block.max_hp();
        let legendary = stat_block
            .as_enemy()
            .map(|e| e.legendary_action_count)
            .unwrap_or(0);
        Self {
            id,
            side: stat_block.side(),
            initiative: None,
            starting_hp: max_hp,
            current_hp: max_hp,
            max_hp,
            armor_class: stat_block.armor_class(),
            is_active: true,
            is_stable: false,
            is_dead: false,
            budget: TurnBudget::default(),
            conditions: ConditionSet::new(),
            exhaustion: 0,
            concentration: None,
            death_saves: DeathSaves::default(),
            last_death_save_round: None,
            legendary_actions_max: legendary,
            legendary_actions_remaining: legendary,
            spell_slots: BTreeMap::new(),
            position: Position::default(),
            environment: LocalEnvironment::default(),
            cover_override: None,
            grappling: None,
            grappled_by: None,
            damage_profile: stat_block.damage_profile(),
            stat_block,
        }
    }

    pub fn name(&self) -> &str {
        self.stat_block.name()
    }

    pub fn is_enemy(&self) -> bool {
        self.stat_block.is_enemy()
    }

    /// At 0 HP, not dead, not stable
    pub fn is_dying(&self) -> bool {
        self.current_hp == 0 && !self.is_dead && !self.is_stable
    }

    /// Able to take actions and reactions
    pub fn can_act(&self) -> bool {
        self.is_active && !self.conditions.is_incapacitated()
    }

    /// Cover in effect: explicit override first, then the area
    pub fn cover(&self) -> Cover {
        self.cover_override.unwrap_or(self.environment.cover)
    }

    /// Armor class including cover; `None` behind full cover
    pub fn effective_ac(&self) -> Option<i32> {
        super::environment::cover_bonus(self.cover()).map(|(ac, _)| self.armor_class + ac)
    }

    /// Speed after conditions and exhaustion
    pub fn effective_speed(&self) -> i32 {
        conditions::effective_speed(
            self.stat_block.speed(),
            &self.conditions.active(),
            self.exhaustion,
        )
    }

    /// Own attacks are at disadvantage
    pub fn attacks_with_disadvantage(&self) -> bool {
        conditions::has_attack_disadvantage(&self.conditions.active()) || self.exhaustion >= 3
    }

    /// Reduce HP; resistances must already have been applied.
    ///
    /// `massive_damage` kills a character outright when the damage left
    /// over after reaching 0 is at least their maximum HP. A character
    /// already at 0 gains a death-save failure (two on a critical).
    pub fn take_damage(&mut self, amount: i32, critical: bool, massive_damage: bool) -> DamageTaken {
        let amount = amount.max(0);
        let hp_before = self.current_hp;
        let mut taken = DamageTaken {
            amount,
            hp_before,
            hp_after: hp_before,
            dropped: false,
            died: false,
            concentration_dc: None,
        };
        if self.is_dead || amount == 0 {
            return taken;
        }

        if hp_before == 0 {
            self.is_stable = false;
            if massive_damage && amount >= self.max_hp {
                self.die();
            } else {
                self.death_saves.add_failure(if critical { 2 } else { 1 });
                if self.death_saves.failures >= 3 {
                    self.die();
                }
            }
            taken.died = self.is_dead;
            return taken;
        }

        let overflow = amount - hp_before;
        self.current_hp = (hp_before - amount).max(0);
        taken.hp_after = self.current_hp;

        if self.current_hp == 0 {
            taken.dropped = true;
            self.is_active = false;
            self.is_stable = false;
            self.death_saves = DeathSaves::default();
            if self.is_enemy() || (massive_damage && overflow >= self.max_hp) {
                self.die();
            }
            taken.died = self.is_dead;
        } else if self.concentration.is_some() {
            taken.concentration_dc = Some(super::resolve::concentration_dc(amount));
        }
        taken
    }

    fn die(&mut self) {
        self.current_hp = 0;
        self.is_active = false;
        self.is_stable = false;
        self.is_dead = true;
        self.death_saves.failures = 3;
    }

    /// Restore HP up to the maximum; returns HP actually gained
    pub fn heal(&mut self, amount: i32) -> CombatResult<i32> {
        if self.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", self.name())));
        }
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_add(amount.max(0)).min(self.max_hp);
        if self.current_hp > 0 {
            self.is_active = true;
            self.is_stable = false;
            self.death_saves = DeathSaves::default();
        }
        Ok(self.current_hp - before)
    }

    /// Clear the budget at the start of this participant's turn
    pub fn reset_turn(&mut self) {
        self.budget = TurnBudget::default();
    }

    /// Spend the turn's action
    pub fn use_action(&mut self) -> CombatResult<()> {
        if self.budget.action_used {
            return Err(CombatError::illegal_state(format!(
                "{} already used their action this turn",
                self.name()
            )));
        }
        self.budget.action_used = true;
        Ok(())
    }

    pub fn use_reaction(&mut self) -> CombatResult<()> {
        if self.budget.reaction_used {
            return Err(CombatError::illegal_state(format!(
                "{} already used their reaction this round",
                self.name()
            )));
        }
        self.budget.reaction_used = true;
        Ok(())
    }

    /// Feet of movement left this turn
    pub fn movement_remaining(&self) -> f64 {
        (self.effective_speed() as f64 - self.budget.movement_used).max(0.0)
    }

    pub fn spend_movement(&mut self, feet: f64) -> CombatResult<()> {
        let remaining = self.movement_remaining();
        if feet > remaining + f64::EPSILON {
            return Err(CombatError::illegal_state(format!(
                "{} needs {:.1} ft of movement but has {:.1} ft left",
                self.name(),
                feet,
                remaining
            )));
        }
        self.budget.movement_used += feet;
        Ok(())
    }

    /// Spend legendary points; returns what is left
    pub fn use_legendary_action(&mut self, cost: u32) -> CombatResult<u32> {
        if cost > self.legendary_actions_remaining {
            return Err(CombatError::illegal_state(format!(
                "{} has {} legendary actions left, needs {}",
                self.name(),
                self.legendary_actions_remaining,
                cost
            )));
        }
        self.legendary_actions_remaining -= cost;
        Ok(self.legendary_actions_remaining)
    }

    pub fn reset_legendary_actions(&mut self) {
        self.legendary_actions_remaining = self.legendary_actions_max;
    }

    /// Whether an enemy can cast `name` right now.
    ///
    /// The ledger entry is created from the stat block the first time a
    /// limited spell is asked about.
    pub fn can_cast_enemy_spell(&mut self, name: &str) -> bool {
        let Some(spell) = self.stat_block.as_enemy().and_then(|e| e.spell(name)) else {
            return false;
        };
        let Some(uses) = spell.uses else {
            return true;
        };
        let remaining = self
            .spell_slots
            .entry(spell.name.to_lowercase())
            .or_insert(uses);
        *remaining > 0
    }

    /// Spend one use of an enemy spell (no-op for at-will spells)
    pub fn use_enemy_spell(&mut self, name: &str) -> CombatResult<()> {
        let known = self
            .stat_block
            .as_enemy()
            .and_then(|e| e.spell(name))
            .map(|s| (s.name.to_lowercase(), s.uses));
        let Some((key, uses)) = known else {
            return Err(CombatError::validation(format!(
                "{} does not know {}",
                self.name(),
                name
            )));
        };
        if !self.can_cast_enemy_spell(name) {
            return Err(CombatError::illegal_state(format!(
                "{} has no uses of {} left",
                self.name(),
                name
            )));
        }
        if uses.is_some() {
            if let Some(remaining) = self.spell_slots.get_mut(&key) {
                *remaining -= 1;
            }
        }
        Ok(())
    }

    /// Full refresh of every limited spell
    pub fn reset_enemy_spell_slots(&mut self) {
        self.spell_slots.clear();
    }

    /// Record a death saving throw roll (a natural d20)
    pub fn make_death_save(&mut self, roll: u32) -> CombatResult<DeathSaveOutcome> {
        if self.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", self.name())));
        }
        if !self.is_dying() {
            return Err(CombatError::illegal_state(format!(
                "{} is not making death saves",
                self.name()
            )));
        }
        if !(1..=20).contains(&roll) {
            return Err(CombatError::validation(format!("death save roll {} outside 1-20", roll)));
        }

        let mut revived = false;
        let success = roll >= 10;
        match roll {
            20 => {
                self.current_hp = 1;
                self.is_active = true;
                self.death_saves = DeathSaves::default();
                revived = true;
            }
            1 => self.death_saves.add_failure(2),
            10..=19 => self.death_saves.add_success(1),
            _ => self.death_saves.add_failure(1),
        }

        let counters = self.death_saves;
        if self.death_saves.failures >= 3 {
            self.die();
        } else if self.death_saves.successes >= 3 {
            self.is_stable = true;
            self.death_saves = DeathSaves::default();
        }

        Ok(DeathSaveOutcome {
            roll,
            success,
            successes: counters.successes,
            failures: counters.failures,
            is_stable: self.is_stable,
            is_dead: self.is_dead,
            revived,
        })
    }

    /// Begin concentrating; returns the spell that was dropped, if any
    pub fn start_concentration(&mut self, spell: &str, round: u32) -> Option<String> {
        let previous = self.break_concentration();
        self.concentration = Some(Concentration {
            spell: spell.to_string(),
            since_round: round,
        });
        previous
    }

    /// End concentration; returns the spell that ended
    pub fn break_concentration(&mut self) -> Option<String> {
        self.concentration.take().map(|c| c.spell)
    }

    /// Raise exhaustion by one, up to 6; returns the new level
    pub fn add_exhaustion(&mut self) -> u8 {
        self.exhaustion = (self.exhaustion + 1).min(6);
        self.exhaustion
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.has(condition)
    }
}
