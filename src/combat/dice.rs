//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2", optionally
//! followed by a damage type ("2d6+3 slashing"). All rolls go through a
//! [`DiceRoller`] so tests can pin exact results.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::damage::DamageType;

/// Dice notation parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("missing 'd' in dice notation: {0}")]
    MissingSeparator(String),

    #[error("invalid dice count: {0}")]
    InvalidCount(String),

    #[error("invalid die sides: {0}")]
    InvalidSides(String),

    #[error("invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("unknown damage type: {0}")]
    UnknownDamageType(String),

    #[error("dice expression out of range: {0}")]
    OutOfRange(String),
}

/// Most dice one expression may roll
pub const MAX_DICE_COUNT: u32 = 100;

/// Largest die allowed
pub const MAX_DIE_SIDES: u32 = 1000;

/// Largest flat bonus or penalty allowed
pub const MAX_MODIFIER: i32 = 10_000;

/// Source of die results
pub trait DiceRoller: Send + fmt::Debug {
    /// Roll one die with the given number of sides (1..=sides)
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Roll a single d20
    fn d20(&mut self) -> u32 {
        self.roll_die(20)
    }
}

/// Roller backed by a real PRNG
#[derive(Debug)]
pub struct RandomRoller {
    rng: StdRng,
}

impl RandomRoller {
    /// Roller seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic roller for replays
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomRoller {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRoller for RandomRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.random_range(1..=sides)
    }
}

/// Roller that replays a scripted sequence of results.
///
/// Each queued value is clamped into `1..=sides` of the die being rolled.
/// Once the script runs out every roll returns the fallback value.
#[derive(Debug, Clone)]
pub struct FixedRoller {
    queue: VecDeque<u32>,
    fallback: u32,
}

impl FixedRoller {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            queue: rolls.into_iter().collect(),
            fallback: 10,
        }
    }

    /// Set the value returned once the script is exhausted
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append more scripted results
    pub fn push(&mut self, rolls: impl IntoIterator<Item = u32>) {
        self.queue.extend(rolls);
    }

    /// Number of scripted results not yet consumed
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DiceRoller for FixedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let value = self.queue.pop_front().unwrap_or(self.fallback);
        value.clamp(1, sides.max(1))
    }
}

/// A parsed dice roll specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Roll the dice and return the total
    pub fn roll(&self, roller: &mut dyn DiceRoller) -> i32 {
        self.roll_detailed(roller).1
    }

    /// Roll and return individual die results plus total.
    ///
    /// The total saturates at the bounds of `i32`.
    pub fn roll_detailed(&self, roller: &mut dyn DiceRoller) -> (Vec<u32>, i32) {
        let results: Vec<u32> = (0..self.count).map(|_| roller.roll_die(self.sides)).collect();
        let sum: i64 = results.iter().map(|&r| i64::from(r)).sum();
        (results, saturate(sum + i64::from(self.modifier)))
    }

    /// The same roll with the dice count doubled; the flat modifier is untouched
    pub fn doubled_dice(&self) -> Self {
        Self {
            count: self.count.saturating_mul(2),
            ..*self
        }
    }

    /// Same dice with a different flat modifier
    pub fn with_modifier(&self, modifier: i32) -> Self {
        Self { modifier, ..*self }
    }

    /// Expected result, rounded down
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.count as f64 * avg_per_die + self.modifier as f64) as i32
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Dice with an optional damage type, e.g. "2d6+3 slashing"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageDice {
    pub dice: DiceRoll,
    pub damage_type: Option<DamageType>,
}

impl DamageDice {
    /// Damage type, falling back to the given default
    pub fn damage_type_or(&self, default: DamageType) -> DamageType {
        self.damage_type.unwrap_or(default)
    }
}

impl FromStr for DamageDice {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_damage(s)
    }
}

impl fmt::Display for DamageDice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.damage_type {
            Some(dtype) => write!(f, "{} {}", self.dice, dtype),
            None => write!(f, "{}", self.dice),
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let notation: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let d_pos = notation
        .find('d')
        .ok_or_else(|| DiceError::MissingSeparator(notation.clone()))?;

    // Parse count (before 'd'); "d6" means "1d6"
    let count_str = &notation[..d_pos];
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| DiceError::InvalidCount(count_str.to_string()))?
    };

    if count == 0 {
        return Err(DiceError::InvalidCount(count_str.to_string()));
    }

    let rest = &notation[d_pos + 1..];

    let (sides_str, modifier) = if let Some(plus_pos) = rest.find('+') {
        let mod_str = &rest[plus_pos + 1..];
        let modifier: i32 = mod_str
            .parse()
            .map_err(|_| DiceError::InvalidModifier(mod_str.to_string()))?;
        (&rest[..plus_pos], modifier)
    } else if let Some(minus_pos) = rest.rfind('-') {
        if minus_pos == 0 {
            return Err(DiceError::InvalidSides(rest.to_string()));
        }
        // Keep the minus sign in the modifier
        let mod_str = &rest[minus_pos..];
        let modifier: i32 = mod_str
            .parse()
            .map_err(|_| DiceError::InvalidModifier(mod_str.to_string()))?;
        (&rest[..minus_pos], modifier)
    } else {
        (rest, 0)
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| DiceError::InvalidSides(sides_str.to_string()))?;

    if sides == 0 {
        return Err(DiceError::InvalidSides(sides_str.to_string()));
    }

    if count > MAX_DICE_COUNT
        || sides > MAX_DIE_SIDES
        || modifier.unsigned_abs() > MAX_MODIFIER.unsigned_abs()
    {
        return Err(DiceError::OutOfRange(notation));
    }

    Ok(DiceRoll {
        count,
        sides,
        modifier,
    })
}

/// Parse `NdM[+B] [type]`
pub fn parse_damage(notation: &str) -> Result<DamageDice, DiceError> {
    let notation = notation.trim();
    let (dice_part, type_part) = match notation.find(|c: char| c.is_ascii_alphabetic() && c != 'd' && c != 'D') {
        Some(pos) => (&notation[..pos], Some(notation[pos..].trim())),
        None => (notation, None),
    };

    let dice = parse_dice(dice_part)?;
    let damage_type = match type_part {
        Some(name) if !name.is_empty() => {
            // "fire damage" and "fire" are both accepted
            let name = name.trim_end_matches("damage").trim();
            Some(
                name.parse::<DamageType>()
                    .map_err(|_| DiceError::UnknownDamageType(name.to_string()))?,
            )
        }
        _ => None,
    };

    Ok(DamageDice { dice, damage_type })
}

/// How a d20 is rolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl RollMode {
    /// Advantage and disadvantage together cancel to a plain roll
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Self {
        match (advantage, disadvantage) {
            (true, false) => RollMode::Advantage,
            (false, true) => RollMode::Disadvantage,
            _ => RollMode::Normal,
        }
    }
}

/// Result of rolling a d20 under a roll mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    /// Every die that was thrown (one or two)
    pub rolls: Vec<u32>,
    /// The die that counts
    pub natural: u32,
    pub mode: RollMode,
}

impl D20Roll {
    pub fn is_critical(&self) -> bool {
        is_critical(self.natural)
    }

    pub fn is_fumble(&self) -> bool {
        is_fumble(self.natural)
    }
}

/// Roll a d20 with advantage, disadvantage, or neither
pub fn roll_d20(roller: &mut dyn DiceRoller, mode: RollMode) -> D20Roll {
    let first = roller.d20();
    let (rolls, natural) = match mode {
        RollMode::Normal => (vec![first], first),
        RollMode::Advantage => {
            let second = roller.d20();
            (vec![first, second], first.max(second))
        }
        RollMode::Disadvantage => {
            let second = roller.d20();
            (vec![first, second], first.min(second))
        }
    };
    D20Roll {
        rolls,
        natural,
        mode,
    }
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}
