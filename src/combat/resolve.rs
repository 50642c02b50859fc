//! Attack, save and damage resolution
//!
//! Pure arithmetic over a roller and numbers the session has already
//! gathered. Nothing in here reads or mutates participant state:
//! - attack rolls against an effective AC
//! - damage rolls (criticals double the dice, not the bonus)
//! - resistance, immunity and vulnerability
//! - saving throws, including auto-fail
//! - area damage halving and concentration DCs

use serde::{Deserialize, Serialize};

use super::damage::{DamageProfile, DamageResult, DamageType};
use super::dice::{roll_d20, D20Roll, DamageDice, DiceRoll, DiceRoller, RollMode};
use super::modifiers::ModifierStack;

/// Outcome of one attack roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub d20: D20Roll,
    /// Attack bonus plus numeric modifiers
    pub modifier: i32,
    pub total: i32,
    pub target_ac: i32,
    pub hit: bool,
    pub critical: bool,
    pub fumble: bool,
}

/// Roll to hit.
///
/// A natural 20 always hits and crits; a natural 1 always misses.
/// `auto_crit` turns any other hit into a critical (melee against a
/// paralyzed or unconscious target).
pub fn attack_roll(
    roller: &mut dyn DiceRoller,
    attack_bonus: i32,
    target_ac: i32,
    modifiers: &ModifierStack,
    auto_crit: bool,
) -> AttackRoll {
    let d20 = roll_d20(roller, modifiers.mode());
    let modifier = attack_bonus + modifiers.bonus();
    let total = (d20.natural as i32).saturating_add(modifier);
    let fumble = d20.is_fumble();
    let natural_crit = d20.is_critical();
    let hit = natural_crit || (!fumble && total >= target_ac);
    AttackRoll {
        critical: natural_crit || (hit && auto_crit),
        d20,
        modifier,
        total,
        target_ac,
        hit,
        fumble,
    }
}

/// Dice actually thrown for a damage roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    /// The expression rolled, after critical doubling
    pub dice: DiceRoll,
    pub rolls: Vec<u32>,
    /// Never below zero
    pub total: i32,
    pub damage_type: DamageType,
}

/// Roll damage; on a critical the dice count doubles and the bonus stays
pub fn roll_damage(
    roller: &mut dyn DiceRoller,
    damage: &DamageDice,
    default_type: DamageType,
    critical: bool,
) -> DamageRoll {
    let dice = if critical {
        damage.dice.doubled_dice()
    } else {
        damage.dice
    };
    let (rolls, total) = dice.roll_detailed(roller);
    DamageRoll {
        dice,
        rolls,
        total: total.max(0),
        damage_type: damage.damage_type_or(default_type),
    }
}

/// Scale raw damage by the target's resistances
pub fn apply_resistance(
    profile: &DamageProfile,
    amount: i32,
    damage_type: DamageType,
    critical: bool,
) -> DamageResult {
    profile.calculate_damage(amount.max(0), damage_type, critical)
}

/// Outcome of a saving throw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRoll {
    /// `None` when the save failed automatically and no die was thrown
    pub d20: Option<D20Roll>,
    pub modifier: i32,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
    pub auto_failed: bool,
}

/// Roll a saving throw: success iff total >= DC
pub fn saving_throw(
    roller: &mut dyn DiceRoller,
    save_bonus: i32,
    dc: i32,
    modifiers: &ModifierStack,
    auto_fail: bool,
) -> SaveRoll {
    let modifier = save_bonus + modifiers.bonus();
    if auto_fail {
        return SaveRoll {
            d20: None,
            modifier,
            total: modifier,
            dc,
            success: false,
            auto_failed: true,
        };
    }
    let d20 = roll_d20(roller, modifiers.mode());
    let total = (d20.natural as i32).saturating_add(modifier);
    SaveRoll {
        d20: Some(d20),
        modifier,
        total,
        dc,
        success: total >= dc,
        auto_failed: false,
    }
}

/// Damage dealt by an area effect after the target's save
pub fn aoe_damage(base: i32, saved: bool, half_on_save: bool) -> i32 {
    match (saved, half_on_save) {
        (false, _) => base,
        (true, true) => base / 2,
        (true, false) => 0,
    }
}

/// DC of the Constitution save to keep concentrating after taking damage
pub fn concentration_dc(damage: i32) -> i32 {
    (damage / 2).max(10)
}

/// Contested check; ties go to the defender
pub fn contest(
    roller: &mut dyn DiceRoller,
    attacker_bonus: i32,
    defender_bonus: i32,
) -> (i32, i32, bool) {
    let attacker = (roll_d20(roller, RollMode::Normal).natural as i32).saturating_add(attacker_bonus);
    let defender = (roll_d20(roller, RollMode::Normal).natural as i32).saturating_add(defender_bonus);
    (attacker, defender, attacker > defender)
}
