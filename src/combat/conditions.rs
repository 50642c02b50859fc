//! Condition effect engine
//!
//! Maps each condition to the behavioral flags it imposes, maps spells to
//! the condition they inflict, and tracks condition applications on a
//! participant with their provenance:
//! - Who or what applied the condition, and when
//! - How long it lasts (instant, a number of rounds, or while concentrating)
//! - Several applications of the same condition may coexist

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::error::CombatError;
use super::stats::Ability;

/// Standard conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Exhaustion,
}

impl Condition {
    pub fn all() -> &'static [Condition] {
        &[
            Condition::Blinded,
            Condition::Charmed,
            Condition::Deafened,
            Condition::Frightened,
            Condition::Grappled,
            Condition::Incapacitated,
            Condition::Invisible,
            Condition::Paralyzed,
            Condition::Petrified,
            Condition::Poisoned,
            Condition::Prone,
            Condition::Restrained,
            Condition::Stunned,
            Condition::Unconscious,
            Condition::Exhaustion,
        ]
    }

    /// Rules summary
    pub fn description(&self) -> &'static str {
        match self {
            Condition::Blinded => "Can't see. Attacks against it have advantage; its attacks have disadvantage.",
            Condition::Charmed => "Can't attack the charmer or target it with harmful effects.",
            Condition::Deafened => "Can't hear; fails checks that require hearing.",
            Condition::Frightened => "Disadvantage on attacks and checks while the source is in sight.",
            Condition::Grappled => "Speed becomes 0.",
            Condition::Incapacitated => "Can't take actions or reactions.",
            Condition::Invisible => "Attacks against it have disadvantage; its attacks have advantage.",
            Condition::Paralyzed => "Incapacitated, can't move. Fails STR and DEX saves. Attacks against it have advantage; melee hits are critical.",
            Condition::Petrified => "Turned to stone: incapacitated, fails STR and DEX saves, attacks against it have advantage.",
            Condition::Poisoned => "Disadvantage on attack rolls and ability checks.",
            Condition::Prone => "Disadvantage on attacks. Melee attacks against it have advantage, ranged attacks disadvantage.",
            Condition::Restrained => "Speed 0. Attacks against it have advantage; its attacks and DEX saves have disadvantage.",
            Condition::Stunned => "Incapacitated, fails STR and DEX saves, attacks against it have advantage.",
            Condition::Unconscious => "Incapacitated and prone, fails STR and DEX saves, attacks against it have advantage; melee hits are critical.",
            Condition::Exhaustion => "Cumulative levels: 2 halves speed, 3 gives disadvantage on attacks, 5 reduces speed to 0.",
        }
    }

    /// Behavioral flags for this condition
    pub fn effects(&self) -> ConditionEffects {
        let none = ConditionEffects::default();
        match self {
            Condition::Blinded => ConditionEffects {
                attack_disadvantage: true,
                attacks_against_advantage: true,
                ..none
            },
            Condition::Charmed | Condition::Deafened | Condition::Exhaustion => none,
            Condition::Frightened => ConditionEffects {
                attack_disadvantage: true,
                check_disadvantage: true,
                ..none
            },
            Condition::Grappled => ConditionEffects {
                speed_zero: true,
                ..none
            },
            Condition::Incapacitated => ConditionEffects {
                incapacitated: true,
                ..none
            },
            Condition::Invisible => ConditionEffects {
                attack_advantage: true,
                attacks_against_disadvantage: true,
                ..none
            },
            Condition::Paralyzed => ConditionEffects {
                speed_zero: true,
                incapacitated: true,
                attacks_against_advantage: true,
                auto_fail_str_dex: true,
                melee_auto_crit: true,
                ..none
            },
            Condition::Petrified => ConditionEffects {
                speed_zero: true,
                incapacitated: true,
                attacks_against_advantage: true,
                auto_fail_str_dex: true,
                ..none
            },
            Condition::Poisoned => ConditionEffects {
                attack_disadvantage: true,
                check_disadvantage: true,
                ..none
            },
            Condition::Prone => ConditionEffects {
                attack_disadvantage: true,
                melee_against_advantage: true,
                ranged_against_disadvantage: true,
                ..none
            },
            Condition::Restrained => ConditionEffects {
                speed_zero: true,
                attack_disadvantage: true,
                attacks_against_advantage: true,
                dex_save_disadvantage: true,
                ..none
            },
            Condition::Stunned => ConditionEffects {
                incapacitated: true,
                attacks_against_advantage: true,
                auto_fail_str_dex: true,
                ..none
            },
            Condition::Unconscious => ConditionEffects {
                speed_zero: true,
                incapacitated: true,
                attacks_against_advantage: true,
                auto_fail_str_dex: true,
                melee_auto_crit: true,
                ..none
            },
        }
    }
}

impl FromStr for Condition {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Condition::all()
            .iter()
            .copied()
            .find(|c| c.to_string() == wanted)
            .ok_or_else(|| CombatError::validation(format!("unknown condition: {}", s.trim())))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Blinded => "blinded",
            Condition::Charmed => "charmed",
            Condition::Deafened => "deafened",
            Condition::Frightened => "frightened",
            Condition::Grappled => "grappled",
            Condition::Incapacitated => "incapacitated",
            Condition::Invisible => "invisible",
            Condition::Paralyzed => "paralyzed",
            Condition::Petrified => "petrified",
            Condition::Poisoned => "poisoned",
            Condition::Prone => "prone",
            Condition::Restrained => "restrained",
            Condition::Stunned => "stunned",
            Condition::Unconscious => "unconscious",
            Condition::Exhaustion => "exhaustion",
        };
        write!(f, "{}", s)
    }
}

/// What a condition does to the creature that has it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionEffects {
    /// Speed becomes 0
    pub speed_zero: bool,
    /// Can't take actions or reactions
    pub incapacitated: bool,
    /// Own attack rolls have disadvantage
    pub attack_disadvantage: bool,
    /// Own attack rolls have advantage
    pub attack_advantage: bool,
    /// Attack rolls against it have advantage
    pub attacks_against_advantage: bool,
    /// Attack rolls against it have disadvantage
    pub attacks_against_disadvantage: bool,
    /// Melee attacks against it have advantage
    pub melee_against_advantage: bool,
    /// Ranged attacks against it have disadvantage
    pub ranged_against_disadvantage: bool,
    /// Automatically fails STR and DEX saving throws
    pub auto_fail_str_dex: bool,
    pub dex_save_disadvantage: bool,
    pub check_disadvantage: bool,
    /// Melee hits against it are critical hits
    pub melee_auto_crit: bool,
}

/// Conditions that give disadvantage on the creature's own attacks
pub const ATTACK_DISADVANTAGE_CONDITIONS: &[Condition] = &[
    Condition::Blinded,
    Condition::Frightened,
    Condition::Poisoned,
    Condition::Prone,
    Condition::Restrained,
];

/// Conditions that give attackers advantage against the creature
pub const ADVANTAGE_AGAINST_CONDITIONS: &[Condition] = &[
    Condition::Blinded,
    Condition::Paralyzed,
    Condition::Petrified,
    Condition::Restrained,
    Condition::Stunned,
    Condition::Unconscious,
];

/// Conditions that force speed to 0
pub const SPEED_ZERO_CONDITIONS: &[Condition] = &[
    Condition::Grappled,
    Condition::Restrained,
    Condition::Paralyzed,
    Condition::Unconscious,
    Condition::Petrified,
];

/// How long a condition application lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rounds", rename_all = "snake_case")]
pub enum ConditionDuration {
    /// Lasts until something removes it
    Instant,
    /// Lasts a number of rounds
    Rounds(u32),
    /// Lasts while the source keeps concentrating
    Concentration,
}

/// A condition a spell imposes on a failed save (or with no save at all)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpellCondition {
    pub condition: Condition,
    /// Save that resists it; `None` means it simply applies
    pub save: Option<Ability>,
    pub duration: ConditionDuration,
}

/// Spell name (lowercase) to imposed condition
static SPELL_CONDITIONS: LazyLock<HashMap<&'static str, SpellCondition>> = LazyLock::new(|| {
    use Ability::*;
    use Condition::*;
    use ConditionDuration::{Concentration as Conc, Rounds};

    let entries: [(&str, Condition, Option<Ability>, ConditionDuration); 20] = [
        ("hold person", Paralyzed, Some(Wisdom), Conc),
        ("hold monster", Paralyzed, Some(Wisdom), Conc),
        ("sleep", Unconscious, None, Rounds(10)),
        ("blindness/deafness", Blinded, Some(Constitution), Rounds(10)),
        ("color spray", Blinded, None, Rounds(1)),
        ("entangle", Restrained, Some(Strength), Conc),
        ("web", Restrained, Some(Dexterity), Conc),
        ("ensnaring strike", Restrained, Some(Strength), Conc),
        ("fear", Frightened, Some(Wisdom), Conc),
        ("cause fear", Frightened, Some(Wisdom), Conc),
        ("charm person", Charmed, Some(Wisdom), Rounds(600)),
        ("hypnotic pattern", Charmed, Some(Wisdom), Conc),
        ("tasha's hideous laughter", Prone, Some(Wisdom), Conc),
        ("command", Prone, Some(Wisdom), Rounds(1)),
        ("grease", Prone, Some(Dexterity), Rounds(10)),
        ("ray of sickness", Poisoned, Some(Constitution), Rounds(1)),
        ("contagion", Poisoned, Some(Constitution), Rounds(70)),
        ("power word stun", Stunned, None, Rounds(1)),
        ("flesh to stone", Restrained, Some(Constitution), Conc),
        ("invisibility", Invisible, None, Conc),
    ];

    entries
        .into_iter()
        .map(|(name, condition, save, duration)| {
            (
                name,
                SpellCondition {
                    condition,
                    save,
                    duration,
                },
            )
        })
        .collect()
});

/// Condition a spell imposes, if any
pub fn spell_condition(spell_name: &str) -> Option<SpellCondition> {
    SPELL_CONDITIONS
        .get(spell_name.trim().to_lowercase().as_str())
        .copied()
}

/// One condition instance attached to a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionApplication {
    /// Unique within the session
    pub id: u64,
    pub condition: Condition,
    pub applied_round: u32,
    pub applied_turn: usize,
    pub duration: ConditionDuration,
    /// Round at whose start this application is removed
    pub expires_at_round: Option<u32>,
    /// Spell, ability, or trigger that caused it
    pub source: Option<String>,
    /// Participant who caused it
    pub source_participant: Option<u32>,
}

/// Where a new application comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub source: Option<String>,
    pub source_participant: Option<u32>,
}

impl Provenance {
    pub fn new(source: &str, source_participant: Option<u32>) -> Self {
        Self {
            source: Some(source.to_string()),
            source_participant,
        }
    }
}

/// All condition applications on one participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    applications: Vec<ConditionApplication>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new application; returns a copy of it
    pub fn apply(&mut self, application: ConditionApplication) -> ConditionApplication {
        self.applications.push(application.clone());
        application
    }

    /// Deduplicated names of the active conditions
    pub fn active(&self) -> BTreeSet<Condition> {
        self.applications.iter().map(|a| a.condition).collect()
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.applications.iter().any(|a| a.condition == condition)
    }

    pub fn applications(&self) -> &[ConditionApplication] {
        &self.applications
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Remove every application of `condition` from `source` (or all sources when `None`)
    pub fn remove(&mut self, condition: Condition, source: Option<&str>) -> Vec<ConditionApplication> {
        self.drain(|a| {
            a.condition == condition
                && source.is_none_or(|s| a.source.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(s)))
        })
    }

    /// Remove concentration-bound applications from one caster's spell
    pub fn remove_concentration(&mut self, caster: u32, spell: &str) -> Vec<ConditionApplication> {
        self.drain(|a| {
            a.duration == ConditionDuration::Concentration
                && a.source_participant == Some(caster)
                && a.source.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(spell))
        })
    }

    /// Remove applications that expire at or before `round`
    pub fn expire(&mut self, round: u32) -> Vec<ConditionApplication> {
        self.drain(|a| a.expires_at_round.is_some_and(|r| r <= round))
    }

    fn drain(&mut self, pred: impl Fn(&ConditionApplication) -> bool) -> Vec<ConditionApplication> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.applications.drain(..).partition(|a| pred(a));
        self.applications = kept;
        removed
    }

    fn any_effect(&self, flag: impl Fn(&ConditionEffects) -> bool) -> bool {
        self.applications.iter().any(|a| flag(&a.condition.effects()))
    }

    pub fn is_incapacitated(&self) -> bool {
        self.any_effect(|e| e.incapacitated)
    }

    pub fn auto_fails_save(&self, ability: Ability) -> bool {
        matches!(ability, Ability::Strength | Ability::Dexterity)
            && self.any_effect(|e| e.auto_fail_str_dex)
    }

    pub fn save_disadvantage(&self, ability: Ability) -> bool {
        ability == Ability::Dexterity && self.any_effect(|e| e.dex_save_disadvantage)
    }

    pub fn melee_auto_crit(&self) -> bool {
        self.any_effect(|e| e.melee_auto_crit)
    }
}

/// Own attacks have disadvantage
pub fn has_attack_disadvantage(conditions: &BTreeSet<Condition>) -> bool {
    ATTACK_DISADVANTAGE_CONDITIONS
        .iter()
        .any(|c| conditions.contains(c))
}

/// Attackers have advantage against a creature with these conditions
pub fn has_attack_advantage_against(conditions: &BTreeSet<Condition>) -> bool {
    ADVANTAGE_AGAINST_CONDITIONS
        .iter()
        .any(|c| conditions.contains(c))
}

/// Speed after conditions and exhaustion
pub fn effective_speed(base_speed: i32, conditions: &BTreeSet<Condition>, exhaustion_level: u8) -> i32 {
    if SPEED_ZERO_CONDITIONS.iter().any(|c| conditions.contains(c)) {
        return 0;
    }
    match exhaustion_level {
        0..=1 => base_speed,
        2..=4 => base_speed / 2,
        _ => 0,
    }
}
