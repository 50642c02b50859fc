//! Stat block adapter
//!
//! Read-only views over the two kinds of creature the engine fights with:
//! player characters and enemies. Both implement [`Combatant`], and
//! [`StatBlock`] is the tagged union a participant holds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::damage::{DamageProfile, DamageType};
use super::dice::{parse_damage, DamageDice, DiceRoll};
use super::error::{CombatError, CombatResult};

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn all() -> &'static [Ability] {
        &[
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Three-letter abbreviation
    pub fn short(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

impl FromStr for Ability {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Strength),
            "dex" | "dexterity" => Ok(Ability::Dexterity),
            "con" | "constitution" => Ok(Ability::Constitution),
            "int" | "intelligence" => Ok(Ability::Intelligence),
            "wis" | "wisdom" => Ok(Ability::Wisdom),
            "cha" | "charisma" => Ok(Ability::Charisma),
            other => Err(CombatError::validation(format!("unknown ability: {}", other))),
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// floor((score - 10) / 2)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Raw ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    pub fn new(str_: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str_,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }

    /// Highest modifier among INT, WIS and CHA
    fn best_mental_modifier(&self) -> i32 {
        [Ability::Intelligence, Ability::Wisdom, Ability::Charisma]
            .iter()
            .map(|a| self.modifier(*a))
            .max()
            .unwrap_or(0)
    }
}

/// A weapon carried by a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Damage notation, e.g. "1d8 slashing"
    pub damage: String,
    #[serde(default)]
    pub finesse: bool,
    #[serde(default)]
    pub two_handed: bool,
    #[serde(default)]
    pub ranged: bool,
    /// Normal range in feet for ranged weapons
    #[serde(default)]
    pub range: Option<u32>,
    #[serde(default)]
    pub magic_bonus: i32,
}

/// Body armor or a shield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub base_ac: i32,
    /// Cap on the DEX bonus (medium armor 2, heavy armor 0)
    #[serde(default)]
    pub max_dex_bonus: Option<i32>,
    #[serde(default)]
    pub shield: bool,
    #[serde(default)]
    pub magic_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumable {
    pub name: String,
    /// Healing dice, e.g. "2d4+2" for a potion of healing
    #[serde(default)]
    pub healing: Option<String>,
}

/// Wondrous items granting flat bonuses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicItem {
    pub name: String,
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub ac_bonus: i32,
    #[serde(default)]
    pub save_bonus: i32,
}

/// Equipment, distinguished by variant rather than by which fields exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Weapon(Weapon),
    Armor(Armor),
    Consumable(Consumable),
    MagicItem(MagicItem),
}

/// An attack a creature can make, normalized across characters and enemies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOption {
    pub name: String,
    /// Total to-hit bonus (ability + proficiency + magic)
    pub attack_bonus: i32,
    pub damage: DamageDice,
    pub damage_type: DamageType,
    pub ranged: bool,
}

impl AttackOption {
    /// Fallback when a stat block lists no attacks
    pub fn unarmed(strength_mod: i32, proficiency_bonus: i32) -> Self {
        Self {
            name: "Unarmed Strike".to_string(),
            attack_bonus: strength_mod + proficiency_bonus,
            damage: DamageDice {
                dice: DiceRoll::new(1, 4, strength_mod),
                damage_type: Some(DamageType::Bludgeoning),
            },
            damage_type: DamageType::Bludgeoning,
            ranged: false,
        }
    }
}

/// Which side of the fight a creature is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Party,
    Hostile,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::Party => Side::Hostile,
            Side::Hostile => Side::Party,
        }
    }
}

/// Capabilities shared by every creature that can fight
pub trait Combatant {
    fn name(&self) -> &str;
    fn ability_scores(&self) -> &AbilityScores;
    fn proficiency_bonus(&self) -> i32;
    fn max_hp(&self) -> i32;
    fn armor_class(&self) -> i32;
    fn speed(&self) -> i32;
    fn has_darkvision(&self) -> bool;
    fn is_save_proficient(&self, ability: Ability) -> bool;
    fn damage_profile(&self) -> DamageProfile;
    /// Attacks this creature can make; parsing was checked by [`StatBlock::validate`]
    fn attacks(&self) -> Vec<AttackOption>;
    fn spell_save_dc(&self) -> i32;
    fn spell_attack_bonus(&self) -> i32;
    fn knows_spell(&self, spell: &str) -> bool;

    fn ability_modifier(&self, ability: Ability) -> i32 {
        self.ability_scores().modifier(ability)
    }

    /// Flat bonus added to saving throws of this ability
    fn save_bonus(&self, ability: Ability) -> i32 {
        let prof = if self.is_save_proficient(ability) {
            self.proficiency_bonus()
        } else {
            0
        };
        self.ability_modifier(ability) + prof
    }
}

fn default_speed() -> i32 {
    30
}

fn default_level() -> u32 {
    1
}

fn default_proficiency() -> i32 {
    2
}

/// A player character's read-only stat block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub abilities: AbilityScores,
    #[serde(default = "default_proficiency")]
    pub proficiency_bonus: i32,
    pub max_hp: i32,
    /// Overrides the AC derived from equipment
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default = "default_speed")]
    pub speed: i32,
    #[serde(default)]
    pub equipment: Vec<Item>,
    #[serde(default)]
    pub spells: Vec<String>,
    #[serde(default)]
    pub spellcasting_ability: Option<Ability>,
    #[serde(default)]
    pub save_proficiencies: Vec<Ability>,
    #[serde(default)]
    pub darkvision: bool,
    #[serde(default)]
    pub resistances: Vec<DamageType>,
}

impl Character {
    pub fn new(name: &str, max_hp: i32, abilities: AbilityScores) -> Self {
        Self {
            name: name.to_string(),
            level: 1,
            abilities,
            proficiency_bonus: 2,
            max_hp,
            armor_class: None,
            speed: 30,
            equipment: Vec::new(),
            spells: Vec::new(),
            spellcasting_ability: None,
            save_proficiencies: Vec::new(),
            darkvision: false,
            resistances: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.equipment.push(item);
        self
    }

    pub fn with_spells(mut self, spells: &[&str], ability: Ability) -> Self {
        self.spells = spells.iter().map(|s| s.to_string()).collect();
        self.spellcasting_ability = Some(ability);
        self
    }

    /// First weapon in the equipment list
    pub fn equipped_weapon(&self) -> Option<&Weapon> {
        self.equipment.iter().find_map(|item| match item {
            Item::Weapon(w) => Some(w),
            _ => None,
        })
    }

    fn body_armor(&self) -> Option<&Armor> {
        self.equipment.iter().find_map(|item| match item {
            Item::Armor(a) if !a.shield => Some(a),
            _ => None,
        })
    }

    fn shield(&self) -> Option<&Armor> {
        self.equipment.iter().find_map(|item| match item {
            Item::Armor(a) if a.shield => Some(a),
            _ => None,
        })
    }

    fn magic_items(&self) -> impl Iterator<Item = &MagicItem> {
        self.equipment.iter().filter_map(|item| match item {
            Item::MagicItem(m) => Some(m),
            _ => None,
        })
    }

    fn spellcasting_modifier(&self) -> i32 {
        match self.spellcasting_ability {
            Some(ability) => self.abilities.modifier(ability),
            None => self.abilities.best_mental_modifier(),
        }
    }

    fn weapon_attack(&self, weapon: &Weapon) -> Option<AttackOption> {
        let dice = parse_damage(&weapon.damage).ok()?;
        let str_mod = self.abilities.modifier(Ability::Strength);
        let dex_mod = self.abilities.modifier(Ability::Dexterity);
        let ability_mod = if weapon.ranged {
            dex_mod
        } else if weapon.finesse {
            str_mod.max(dex_mod)
        } else {
            str_mod
        };
        let item_bonus: i32 = self.magic_items().map(|m| m.attack_bonus).sum();
        let damage_type = dice.damage_type_or(DamageType::Bludgeoning);
        Some(AttackOption {
            name: weapon.name.clone(),
            attack_bonus: ability_mod + self.proficiency_bonus + weapon.magic_bonus + item_bonus,
            damage: DamageDice {
                dice: dice.dice.with_modifier(
                    dice.dice.modifier.saturating_add(ability_mod).saturating_add(weapon.magic_bonus),
                ),
                damage_type: Some(damage_type),
            },
            damage_type,
            ranged: weapon.ranged,
        })
    }
}

impl Combatant for Character {
    fn name(&self) -> &str {
        &self.name
    }

    fn ability_scores(&self) -> &AbilityScores {
        &self.abilities
    }

    fn proficiency_bonus(&self) -> i32 {
        self.proficiency_bonus
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn armor_class(&self) -> i32 {
        if let Some(ac) = self.armor_class {
            return ac;
        }
        let dex_mod = self.abilities.modifier(Ability::Dexterity);
        let mut ac = match self.body_armor() {
            Some(armor) => {
                let dex = match armor.max_dex_bonus {
                    Some(cap) => dex_mod.min(cap),
                    None => dex_mod,
                };
                armor.base_ac + dex + armor.magic_bonus
            }
            None => 10 + dex_mod,
        };
        if let Some(shield) = self.shield() {
            ac += shield.base_ac + shield.magic_bonus;
        }
        ac + self.magic_items().map(|m| m.ac_bonus).sum::<i32>()
    }

    fn speed(&self) -> i32 {
        self.speed
    }

    fn has_darkvision(&self) -> bool {
        self.darkvision
    }

    fn is_save_proficient(&self, ability: Ability) -> bool {
        self.save_proficiencies.contains(&ability)
    }

    fn save_bonus(&self, ability: Ability) -> i32 {
        let prof = if self.is_save_proficient(ability) {
            self.proficiency_bonus
        } else {
            0
        };
        let items: i32 = self.magic_items().map(|m| m.save_bonus).sum();
        self.abilities.modifier(ability) + prof + items
    }

    fn damage_profile(&self) -> DamageProfile {
        DamageProfile::from_lists(&self.resistances, &[], &[])
    }

    fn attacks(&self) -> Vec<AttackOption> {
        self.equipment
            .iter()
            .filter_map(|item| match item {
                Item::Weapon(w) => self.weapon_attack(w),
                _ => None,
            })
            .collect()
    }

    fn spell_save_dc(&self) -> i32 {
        8 + self.proficiency_bonus + self.spellcasting_modifier()
    }

    fn spell_attack_bonus(&self) -> i32 {
        self.proficiency_bonus + self.spellcasting_modifier()
    }

    fn knows_spell(&self, spell: &str) -> bool {
        self.spells.iter().any(|s| s.eq_ignore_ascii_case(spell))
    }
}

/// A named attack from an enemy stat block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyAttack {
    pub name: String,
    pub bonus: i32,
    /// Damage notation, e.g. "2d6+3 slashing"
    pub damage: String,
    #[serde(default)]
    pub ranged: bool,
}

/// A named trait or action with free-text rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyAbility {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A spell an enemy can cast; no `uses` means at will
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpell {
    pub name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub uses: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendaryAction {
    pub name: String,
    #[serde(default = "default_legendary_cost")]
    pub cost: u32,
    #[serde(default)]
    pub description: String,
    /// Name of the attack this legendary action performs, if any
    #[serde(default)]
    pub attack: Option<String>,
}

fn default_legendary_cost() -> u32 {
    1
}

/// An enemy's read-only stat block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    #[serde(default)]
    pub challenge_rating: f32,
    #[serde(default)]
    pub abilities: AbilityScores,
    /// Overrides the CR-derived proficiency bonus
    #[serde(default)]
    pub proficiency_bonus: Option<i32>,
    pub max_hp: i32,
    pub armor_class: i32,
    #[serde(default = "default_speed")]
    pub speed: i32,
    #[serde(default)]
    pub attacks: Vec<EnemyAttack>,
    /// Traits and special actions, scanned for keywords like "multiattack"
    #[serde(default)]
    pub traits: Vec<EnemyAbility>,
    #[serde(default)]
    pub spells: Vec<EnemySpell>,
    #[serde(default)]
    pub spell_save_dc: Option<i32>,
    #[serde(default)]
    pub spell_attack_bonus: Option<i32>,
    #[serde(default)]
    pub resistances: Vec<DamageType>,
    #[serde(default)]
    pub immunities: Vec<DamageType>,
    #[serde(default)]
    pub vulnerabilities: Vec<DamageType>,
    #[serde(default)]
    pub save_proficiencies: Vec<Ability>,
    #[serde(default)]
    pub legendary_actions: Vec<LegendaryAction>,
    /// Legendary action points per round
    #[serde(default)]
    pub legendary_action_count: u32,
    #[serde(default)]
    pub darkvision: bool,
}

impl Enemy {
    pub fn new(name: &str, max_hp: i32, armor_class: i32, abilities: AbilityScores) -> Self {
        Self {
            name: name.to_string(),
            challenge_rating: 0.0,
            abilities,
            proficiency_bonus: None,
            max_hp,
            armor_class,
            speed: 30,
            attacks: Vec::new(),
            traits: Vec::new(),
            spells: Vec::new(),
            spell_save_dc: None,
            spell_attack_bonus: None,
            resistances: Vec::new(),
            immunities: Vec::new(),
            vulnerabilities: Vec::new(),
            save_proficiencies: Vec::new(),
            legendary_actions: Vec::new(),
            legendary_action_count: 0,
            darkvision: false,
        }
    }

    pub fn with_attack(mut self, name: &str, bonus: i32, damage: &str) -> Self {
        self.attacks.push(EnemyAttack {
            name: name.to_string(),
            bonus,
            damage: damage.to_string(),
            ranged: false,
        });
        self
    }

    pub fn with_trait(mut self, name: &str, description: &str) -> Self {
        self.traits.push(EnemyAbility {
            name: name.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn with_spell(mut self, name: &str, level: u32, uses: Option<u32>) -> Self {
        self.spells.push(EnemySpell {
            name: name.to_string(),
            level,
            uses,
        });
        self
    }

    /// Look up a spell definition by name (case-insensitive)
    pub fn spell(&self, name: &str) -> Option<&EnemySpell> {
        self.spells.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Look up a legendary action by name (case-insensitive)
    pub fn legendary_action(&self, name: &str) -> Option<&LegendaryAction> {
        self.legendary_actions
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// Proficiency bonus by challenge rating
fn proficiency_for_cr(cr: f32) -> i32 {
    match cr {
        cr if cr < 5.0 => 2,
        cr if cr < 9.0 => 3,
        cr if cr < 13.0 => 4,
        cr if cr < 17.0 => 5,
        cr if cr < 21.0 => 6,
        cr if cr < 25.0 => 7,
        cr if cr < 29.0 => 8,
        _ => 9,
    }
}

impl Combatant for Enemy {
    fn name(&self) -> &str {
        &self.name
    }

    fn ability_scores(&self) -> &AbilityScores {
        &self.abilities
    }

    fn proficiency_bonus(&self) -> i32 {
        self.proficiency_bonus
            .unwrap_or_else(|| proficiency_for_cr(self.challenge_rating))
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn armor_class(&self) -> i32 {
        self.armor_class
    }

    fn speed(&self) -> i32 {
        self.speed
    }

    fn has_darkvision(&self) -> bool {
        self.darkvision
    }

    fn is_save_proficient(&self, ability: Ability) -> bool {
        self.save_proficiencies.contains(&ability)
    }

    fn damage_profile(&self) -> DamageProfile {
        DamageProfile::from_lists(&self.resistances, &self.immunities, &self.vulnerabilities)
    }

    fn attacks(&self) -> Vec<AttackOption> {
        self.attacks
            .iter()
            .filter_map(|a| {
                let dice = parse_damage(&a.damage).ok()?;
                let damage_type = dice.damage_type_or(DamageType::Bludgeoning);
                Some(AttackOption {
                    name: a.name.clone(),
                    attack_bonus: a.bonus,
                    damage: dice,
                    damage_type,
                    ranged: a.ranged,
                })
            })
            .collect()
    }

    fn spell_save_dc(&self) -> i32 {
        self.spell_save_dc
            .unwrap_or_else(|| 8 + self.proficiency_bonus() + self.abilities.best_mental_modifier())
    }

    fn spell_attack_bonus(&self) -> i32 {
        self.spell_attack_bonus
            .unwrap_or_else(|| self.proficiency_bonus() + self.abilities.best_mental_modifier())
    }

    fn knows_spell(&self, spell: &str) -> bool {
        self.spell(spell).is_some()
    }
}

/// Either kind of stat block; exactly one is ever present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatBlock {
    Character(Character),
    Enemy(Enemy),
}

impl StatBlock {
    fn view(&self) -> &dyn Combatant {
        match self {
            StatBlock::Character(c) => c,
            StatBlock::Enemy(e) => e,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            StatBlock::Character(_) => Side::Party,
            StatBlock::Enemy(_) => Side::Hostile,
        }
    }

    pub fn is_enemy(&self) -> bool {
        matches!(self, StatBlock::Enemy(_))
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match self {
            StatBlock::Enemy(e) => Some(e),
            StatBlock::Character(_) => None,
        }
    }

    pub fn as_character(&self) -> Option<&Character> {
        match self {
            StatBlock::Character(c) => Some(c),
            StatBlock::Enemy(_) => None,
        }
    }

    /// Reject stat blocks with unusable numbers or dice strings
    pub fn validate(&self) -> CombatResult<()> {
        let view = self.view();
        if view.name().trim().is_empty() {
            return Err(CombatError::validation("stat block name is empty"));
        }
        if view.max_hp() <= 0 {
            return Err(CombatError::validation(format!(
                "{}: max_hp must be positive",
                view.name()
            )));
        }
        for ability in Ability::all() {
            let score = view.ability_scores().get(*ability);
            if !(1..=30).contains(&score) {
                return Err(CombatError::validation(format!(
                    "{}: {} score {} outside 1-30",
                    view.name(),
                    ability,
                    score
                )));
            }
        }
        let damage_strings: Vec<&str> = match self {
            StatBlock::Character(c) => c
                .equipment
                .iter()
                .filter_map(|item| match item {
                    Item::Weapon(w) => Some(w.damage.as_str()),
                    Item::Consumable(Consumable {
                        healing: Some(h), ..
                    }) => Some(h.as_str()),
                    _ => None,
                })
                .collect(),
            StatBlock::Enemy(e) => e.attacks.iter().map(|a| a.damage.as_str()).collect(),
        };
        for notation in damage_strings {
            parse_damage(notation)?;
        }
        if let StatBlock::Enemy(e) = self {
            for action in &e.legendary_actions {
                if action.cost == 0 {
                    return Err(CombatError::validation(format!(
                        "{}: legendary action {} has zero cost",
                        e.name, action.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Combatant for StatBlock {
    fn name(&self) -> &str {
        self.view().name()
    }

    fn ability_scores(&self) -> &AbilityScores {
        self.view().ability_scores()
    }

    fn proficiency_bonus(&self) -> i32 {
        self.view().proficiency_bonus()
    }

    fn max_hp(&self) -> i32 {
        self.view().max_hp()
    }

    fn armor_class(&self) -> i32 {
        self.view().armor_class()
    }

    fn speed(&self) -> i32 {
        self.view().speed()
    }

    fn has_darkvision(&self) -> bool {
        self.view().has_darkvision()
    }

    fn is_save_proficient(&self, ability: Ability) -> bool {
        self.view().is_save_proficient(ability)
    }

    fn save_bonus(&self, ability: Ability) -> i32 {
        self.view().save_bonus(ability)
    }

    fn damage_profile(&self) -> DamageProfile {
        self.view().damage_profile()
    }

    fn attacks(&self) -> Vec<AttackOption> {
        self.view().attacks()
    }

    fn spell_save_dc(&self) -> i32 {
        self.view().spell_save_dc()
    }

    fn spell_attack_bonus(&self) -> i32 {
        self.view().spell_attack_bonus()
    }

    fn knows_spell(&self, spell: &str) -> bool {
        self.view().knows_spell(spell)
    }
}
