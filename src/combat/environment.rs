//! Environmental effects
//!
//! Static tables for terrain, cover, lighting, weather and hazards, plus the
//! session-scoped list of effects and the per-position lookup that tells a
//! participant what is in effect where it stands. Each query here is an
//! independent lookup; stacking happens in the resolver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::conditions::Condition;
use super::damage::DamageType;
use super::error::{CombatError, CombatResult};
use super::modifiers::RollModifier;
use super::stats::Ability;

macro_rules! named_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn all() -> &'static [$ty] {
                &[$($ty::$variant),+]
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $($ty::$variant => $name),+
                };
                write!(f, "{}", s)
            }
        }

        impl FromStr for $ty {
            type Err = CombatError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
                $ty::all()
                    .iter()
                    .copied()
                    .find(|v| v.to_string() == wanted)
                    .ok_or_else(|| {
                        CombatError::validation(format!(
                            "unknown {}: {}",
                            stringify!($ty).to_lowercase(),
                            s.trim()
                        ))
                    })
            }
        }
    };
}

/// Ground underfoot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Normal,
    Difficult,
    Rubble,
    Mud,
    Snow,
    Ice,
    ShallowWater,
    DeepWater,
    Quicksand,
}

named_enum!(Terrain {
    Normal => "normal",
    Difficult => "difficult",
    Rubble => "rubble",
    Mud => "mud",
    Snow => "snow",
    Ice => "ice",
    ShallowWater => "shallow_water",
    DeepWater => "deep_water",
    Quicksand => "quicksand",
});

impl Terrain {
    /// Movement cost multiplier
    pub fn movement_multiplier(&self) -> f64 {
        match self {
            Terrain::Normal => 1.0,
            Terrain::Difficult
            | Terrain::Rubble
            | Terrain::Mud
            | Terrain::Snow
            | Terrain::Ice
            | Terrain::ShallowWater => 2.0,
            Terrain::DeepWater | Terrain::Quicksand => 3.0,
        }
    }
}

/// Degree of cover between attacker and target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cover {
    #[default]
    None,
    Half,
    ThreeQuarters,
    Full,
}

named_enum!(Cover {
    None => "none",
    Half => "half",
    ThreeQuarters => "three_quarters",
    Full => "full",
});

/// What cover does to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverEffect {
    Bonus { ac: i32, dex_save: i32 },
    /// Can't be targeted directly
    Untargetable,
}

impl Cover {
    pub fn effect(&self) -> CoverEffect {
        match self {
            Cover::None => CoverEffect::Bonus { ac: 0, dex_save: 0 },
            Cover::Half => CoverEffect::Bonus { ac: 2, dex_save: 2 },
            Cover::ThreeQuarters => CoverEffect::Bonus { ac: 5, dex_save: 5 },
            Cover::Full => CoverEffect::Untargetable,
        }
    }
}

/// Ambient light level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    #[default]
    Bright,
    Dim,
    Darkness,
    MagicalDarkness,
}

named_enum!(Lighting {
    Bright => "bright",
    Dim => "dim",
    Darkness => "darkness",
    MagicalDarkness => "magical_darkness",
});

/// Modifiers light imposes on a creature trying to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightingEffect {
    pub attack: Option<RollModifier>,
    pub perception: Option<RollModifier>,
}

impl Lighting {
    /// Effect on a creature with or without darkvision
    pub fn effect(&self, has_darkvision: bool) -> LightingEffect {
        match (self, has_darkvision) {
            (Lighting::Bright, _) => LightingEffect::default(),
            // Darkvision treats darkness as dim light
            (Lighting::Dim, _) | (Lighting::Darkness, true) => LightingEffect {
                attack: None,
                perception: Some(RollModifier::Disadvantage),
            },
            (Lighting::Darkness, false) | (Lighting::MagicalDarkness, _) => LightingEffect {
                attack: Some(RollModifier::Disadvantage),
                perception: Some(RollModifier::Disadvantage),
            },
        }
    }
}

/// Session-wide weather
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    HeavyRain,
    Fog,
    Snow,
    Blizzard,
    StrongWind,
    Sandstorm,
}

named_enum!(Weather {
    Clear => "clear",
    Rain => "rain",
    HeavyRain => "heavy_rain",
    Fog => "fog",
    Snow => "snow",
    Blizzard => "blizzard",
    StrongWind => "strong_wind",
    Sandstorm => "sandstorm",
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherEffect {
    pub ranged_attack: Option<RollModifier>,
    /// Maximum visibility in feet
    pub visibility: Option<u32>,
    pub movement_multiplier: f64,
}

impl Weather {
    pub fn effect(&self) -> WeatherEffect {
        let (ranged_attack, visibility, movement_multiplier) = match self {
            Weather::Clear => (None, None, 1.0),
            Weather::Rain => (Some(RollModifier::Bonus(-2)), None, 1.0),
            Weather::HeavyRain => (Some(RollModifier::Disadvantage), Some(60), 1.0),
            Weather::Fog => (Some(RollModifier::Disadvantage), Some(30), 1.0),
            Weather::Snow => (Some(RollModifier::Bonus(-2)), Some(120), 1.5),
            Weather::Blizzard => (Some(RollModifier::Disadvantage), Some(30), 2.0),
            Weather::StrongWind => (Some(RollModifier::Disadvantage), None, 1.0),
            Weather::Sandstorm => (Some(RollModifier::Disadvantage), Some(10), 1.5),
        };
        WeatherEffect {
            ranged_attack,
            visibility,
            movement_multiplier,
        }
    }
}

/// Dangerous areas that punish entering them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    Fire,
    AcidPool,
    PoisonGas,
    Spikes,
    FreezingWater,
    FallingRocks,
    LightningField,
}

named_enum!(Hazard {
    Fire => "fire",
    AcidPool => "acid_pool",
    PoisonGas => "poison_gas",
    Spikes => "spikes",
    FreezingWater => "freezing_water",
    FallingRocks => "falling_rocks",
    LightningField => "lightning_field",
});

/// Damage, save and condition a hazard inflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardEffect {
    pub damage: &'static str,
    pub damage_type: DamageType,
    pub save: Ability,
    pub dc: i32,
    pub condition: Option<Condition>,
}

impl Hazard {
    pub fn effect(&self) -> HazardEffect {
        use Ability::*;
        let (damage, damage_type, save, dc, condition) = match self {
            Hazard::Fire => ("2d6", DamageType::Fire, Dexterity, 12, None),
            Hazard::AcidPool => ("2d6", DamageType::Acid, Dexterity, 13, None),
            Hazard::PoisonGas => ("1d8", DamageType::Poison, Constitution, 13, Some(Condition::Poisoned)),
            Hazard::Spikes => ("1d6", DamageType::Piercing, Dexterity, 12, None),
            Hazard::FreezingWater => ("1d6", DamageType::Cold, Constitution, 10, None),
            Hazard::FallingRocks => ("2d10", DamageType::Bludgeoning, Dexterity, 15, Some(Condition::Prone)),
            Hazard::LightningField => ("2d8", DamageType::Lightning, Dexterity, 14, None),
        };
        HazardEffect {
            damage,
            damage_type,
            save,
            dc,
            condition,
        }
    }
}

/// Result of composing terrain and weather movement costs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementCost {
    /// Feet that can actually be covered with the base speed
    pub effective_movement: i32,
    /// Combined multiplier applied to every foot moved
    pub multiplier: f64,
}

/// Compose terrain then weather multipliers against a base speed
pub fn calculate_movement_cost(base_speed: i32, terrain: Terrain, weather: Weather) -> MovementCost {
    let multiplier = terrain.movement_multiplier() * weather.effect().movement_multiplier;
    MovementCost {
        effective_movement: (base_speed as f64 / multiplier).floor() as i32,
        multiplier,
    }
}

/// Cover bonus for a target: `None` means it can't be targeted
pub fn cover_bonus(cover: Cover) -> Option<(i32, i32)> {
    match cover.effect() {
        CoverEffect::Bonus { ac, dex_save } => Some((ac, dex_save)),
        CoverEffect::Untargetable => None,
    }
}

/// Attack modifier from light at the target for an attacker
pub fn lighting_modifier(lighting: Lighting, attacker_darkvision: bool) -> Option<RollModifier> {
    lighting.effect(attacker_darkvision).attack
}

/// Weather modifier for ranged attacks
pub fn weather_modifier(weather: Weather) -> Option<RollModifier> {
    weather.effect().ranged_attack
}

/// The kind-specific payload of an environmental effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EnvironmentKind {
    Terrain(Terrain),
    Cover(Cover),
    Lighting(Lighting),
    Weather(Weather),
    Hazard(Hazard),
}

/// Circular area on the battle map, in feet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Area {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (dx, dy) = (x - self.x, y - self.y);
        (dx * dx + dy * dy).sqrt() <= self.radius
    }
}

/// An effect placed in a session; no area means it covers the whole map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalEffect {
    #[serde(default)]
    pub id: u64,
    #[serde(flatten)]
    pub kind: EnvironmentKind,
    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub description: String,
}

impl EnvironmentalEffect {
    pub fn global(kind: EnvironmentKind) -> Self {
        Self {
            id: 0,
            kind,
            area: None,
            description: String::new(),
        }
    }

    pub fn in_area(kind: EnvironmentKind, x: f64, y: f64, radius: f64) -> Self {
        Self {
            id: 0,
            kind,
            area: Some(Area { x, y, radius }),
            description: String::new(),
        }
    }

    pub fn validate(&self) -> CombatResult<()> {
        if let (EnvironmentKind::Weather(_), Some(_)) = (&self.kind, &self.area) {
            return Err(CombatError::validation("weather is session-wide and takes no area"));
        }
        if let Some(area) = &self.area {
            if !(area.radius.is_finite() && area.radius >= 0.0) {
                return Err(CombatError::validation(format!(
                    "invalid area radius: {}",
                    area.radius
                )));
            }
        }
        Ok(())
    }

    fn applies_at(&self, x: f64, y: f64) -> bool {
        self.area.is_none_or(|a| a.contains(x, y))
    }
}

/// What is in effect at one point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEnvironment {
    pub terrain: Terrain,
    pub cover: Cover,
    pub lighting: Lighting,
    pub weather: Weather,
    pub hazards: Vec<Hazard>,
}

/// All effects placed in one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    effects: Vec<EnvironmentalEffect>,
    next_id: u64,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect and return its assigned id
    pub fn add(&mut self, mut effect: EnvironmentalEffect) -> CombatResult<u64> {
        effect.validate()?;
        self.next_id += 1;
        effect.id = self.next_id;
        self.effects.push(effect);
        Ok(self.next_id)
    }

    pub fn remove(&mut self, id: u64) -> CombatResult<EnvironmentalEffect> {
        let idx = self
            .effects
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CombatError::not_found(format!("environmental effect {}", id)))?;
        Ok(self.effects.remove(idx))
    }

    pub fn effects(&self) -> &[EnvironmentalEffect] {
        &self.effects
    }

    pub fn weather(&self) -> Weather {
        self.effects
            .iter()
            .rev()
            .find_map(|e| match e.kind {
                EnvironmentKind::Weather(w) => Some(w),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Environment at a point; later effects override earlier ones, hazards accumulate
    pub fn state_at(&self, x: f64, y: f64) -> LocalEnvironment {
        let mut local = LocalEnvironment::default();
        for effect in self.effects.iter().filter(|e| e.applies_at(x, y)) {
            match effect.kind {
                EnvironmentKind::Terrain(t) => local.terrain = t,
                EnvironmentKind::Cover(c) => local.cover = c,
                EnvironmentKind::Lighting(l) => local.lighting = l,
                EnvironmentKind::Weather(w) => local.weather = w,
                EnvironmentKind::Hazard(h) => {
                    if !local.hazards.contains(&h) {
                        local.hazards.push(h);
                    }
                }
            }
        }
        local
    }
}
