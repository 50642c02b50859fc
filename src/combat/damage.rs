//! Damage types, resistances and the damage a hit finally deals
//!
//! A creature's stat block lists which of the thirteen damage types it
//! ignores, halves or takes double from. Critical doubling happens in the
//! dice before anything here runs; this module only scales the rolled total.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Acid,
    /// Clubs, falls, constriction
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    /// Arrows, spears, bites
    Piercing,
    Poison,
    Psychic,
    Radiant,
    /// Swords, axes, claws
    Slashing,
    Thunder,
}

impl DamageType {
    /// Lowercase name as it appears in stat blocks
    pub fn as_str(self) -> &'static str {
        match self {
            DamageType::Acid => "acid",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Cold => "cold",
            DamageType::Fire => "fire",
            DamageType::Force => "force",
            DamageType::Lightning => "lightning",
            DamageType::Necrotic => "necrotic",
            DamageType::Piercing => "piercing",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Radiant => "radiant",
            DamageType::Slashing => "slashing",
            DamageType::Thunder => "thunder",
        }
    }
}

impl FromStr for DamageType {
    type Err = ();

    /// Accepts the canonical names plus a few common table-talk aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s.trim().to_lowercase().as_str() {
            "acid" => DamageType::Acid,
            "bludgeoning" | "blunt" => DamageType::Bludgeoning,
            "cold" | "ice" => DamageType::Cold,
            "fire" => DamageType::Fire,
            "force" | "magic" => DamageType::Force,
            "lightning" | "electric" => DamageType::Lightning,
            "necrotic" | "death" => DamageType::Necrotic,
            "piercing" => DamageType::Piercing,
            "poison" => DamageType::Poison,
            "psychic" | "mental" => DamageType::Psychic,
            "radiant" | "holy" => DamageType::Radiant,
            "slashing" => DamageType::Slashing,
            "thunder" | "sonic" => DamageType::Thunder,
            _ => return Err(()),
        };
        Ok(dtype)
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a creature takes one damage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageModifier {
    Immune,
    /// Half, rounded down
    Resistant,
    Normal,
    /// Double
    Vulnerable,
}

impl DamageModifier {
    /// Scale a rolled total; negative totals count as zero
    pub fn apply(&self, damage: i32) -> i32 {
        let damage = damage.max(0);
        match self {
            DamageModifier::Immune => 0,
            DamageModifier::Resistant => damage / 2,
            DamageModifier::Normal => damage,
            DamageModifier::Vulnerable => damage.saturating_mul(2),
        }
    }
}

/// Damage after the target's resistances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageResult {
    /// What the dice showed
    pub base_damage: i32,
    /// What the target loses
    pub final_damage: i32,
    pub damage_type: DamageType,
    pub modifier: DamageModifier,
    /// The dice were already doubled
    pub is_critical: bool,
}

/// A creature's immunities, resistances and vulnerabilities.
///
/// Types not listed take normal damage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageProfile {
    modifiers: BTreeMap<DamageType, DamageModifier>,
}

impl DamageProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stat block lists.
    ///
    /// A type listed more than once keeps the strongest entry:
    /// immunity over resistance over vulnerability.
    pub fn from_lists(
        resistances: &[DamageType],
        immunities: &[DamageType],
        vulnerabilities: &[DamageType],
    ) -> Self {
        let mut profile = Self::new();
        for &dtype in vulnerabilities {
            profile.add_vulnerability(dtype);
        }
        for &dtype in resistances {
            profile.add_resistance(dtype);
        }
        for &dtype in immunities {
            profile.add_immunity(dtype);
        }
        profile
    }

    pub fn get(&self, dtype: DamageType) -> DamageModifier {
        self.modifiers
            .get(&dtype)
            .copied()
            .unwrap_or(DamageModifier::Normal)
    }

    pub fn add_immunity(&mut self, dtype: DamageType) {
        self.modifiers.insert(dtype, DamageModifier::Immune);
    }

    pub fn add_resistance(&mut self, dtype: DamageType) {
        self.modifiers.insert(dtype, DamageModifier::Resistant);
    }

    pub fn add_vulnerability(&mut self, dtype: DamageType) {
        self.modifiers.insert(dtype, DamageModifier::Vulnerable);
    }

    /// Scale an already-rolled total for this creature
    pub fn calculate_damage(&self, base: i32, dtype: DamageType, is_crit: bool) -> DamageResult {
        let modifier = self.get(dtype);
        DamageResult {
            base_damage: base.max(0),
            final_damage: modifier.apply(base),
            damage_type: dtype,
            modifier,
            is_critical: is_crit,
        }
    }
}
