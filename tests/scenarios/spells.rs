//! Spell scenario tests
//!
//! Tests spell attacks, saves, concentration, enemy spell uses and area spells

use crate::harness::{fanatic, fighter, goblin, ogre, wizard, TestTable};
use skirmish::combat::{
    Ability, ActionType, AoeRequest, AttackRequest, Condition, DamageType, ParticipantId, Point, SpellRequest,
};

fn aoe(spell: &str, x: f64, y: f64) -> AoeRequest {
    AoeRequest {
        spell: spell.to_string(),
        target: Point::new(x, y),
        shape: None,
        damage: None,
        save: None,
        dc: None,
        half_on_save: None,
    }
}

fn hold_person(target: ParticipantId) -> SpellRequest {
    SpellRequest {
        spell: "hold person".to_string(),
        target: Some(target),
        ..Default::default()
    }
}

/// Test: Fire bolt resolves as a spell attack against AC
#[test]
fn test_fire_bolt_spell_attack() {
    let mut table = TestTable::new([13, 6]);
    let mage = table.add(wizard("Ilsa"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let request = SpellRequest {
        spell: "fire bolt".to_string(),
        target: Some(gob),
        damage: Some("1d10 fire".to_string()),
        attack_roll: true,
        ..Default::default()
    };
    let outcome = table.cast_spell(mage, &request).unwrap();
    let attack = outcome.attack.unwrap();
    assert!(attack.hit);
    assert_eq!(attack.total, 18);
    let damage = outcome.damage.unwrap();
    assert_eq!(damage.final_damage, 6);
    assert_eq!(damage.damage_type, DamageType::Fire);
    assert_eq!(table.hp(gob), 1);
    assert!(outcome.save.is_none());
    assert_eq!(table.report().spells_cast.get("fire bolt"), Some(&1));
}

/// Test: A failed save against hold person paralyzes the target
#[test]
fn test_hold_person_paralyzes() {
    // Goblin WIS save: 10 - 1 = 9 vs DC 13
    let mut table = TestTable::new([10]);
    let mage = table.add(wizard("Ilsa"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let outcome = table.cast_spell(mage, &hold_person(gob)).unwrap();
    let save = outcome.save.unwrap();
    assert!(!save.success);
    assert_eq!(save.dc, 13);
    let condition = outcome.condition.unwrap();
    assert_eq!(condition.condition, Condition::Paralyzed);
    assert_eq!(condition.source.as_deref(), Some("hold person"));
    assert_eq!(condition.source_participant, Some(mage.0));

    let caster = table.participant(mage).unwrap();
    assert_eq!(caster.concentration.as_ref().unwrap().spell, "hold person");

    table.next_turn().unwrap();
    assert!(!table.participant(gob).unwrap().can_act());
    assert!(table.run_automated_turn().unwrap().is_empty());
    let err = table.attack(gob, mage, &AttackRequest::default()).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Hold the goblin, then let the ogre hit the wizard for 12 (DC 10 to keep it)
fn concentration_table(con_save: u32) -> (TestTable, ParticipantId, ParticipantId, ParticipantId) {
    let mut table = TestTable::new([10, 15, 4, 4, con_save]);
    let mage = table.add(wizard("Ilsa"), 20);
    let brute = table.add(ogre("Grug"), 10);
    let gob = table.add(goblin("Snik"), 5);
    table.start();
    table.cast_spell(mage, &hold_person(gob)).unwrap();
    table.next_turn().unwrap();
    (table, mage, brute, gob)
}

/// Test: Failing the concentration save ends the spell's conditions
#[test]
fn test_concentration_broken_by_damage() {
    let (mut table, mage, brute, gob) = concentration_table(5);
    let outcome = table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert_eq!(table.hp(mage), 6);

    let check = outcome.concentration.unwrap();
    assert_eq!(check.dc, 10);
    assert!(!check.maintained);
    assert_eq!(check.action.action_type, ActionType::Concentration);
    assert!(table.participant(mage).unwrap().concentration.is_none());
    assert!(!table.has(gob, Condition::Paralyzed));
}

/// Test: Passing the concentration save keeps the target held
#[test]
fn test_concentration_maintained() {
    let (mut table, mage, brute, gob) = concentration_table(15);
    let outcome = table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(outcome.concentration.unwrap().maintained);
    assert!(table.has(gob, Condition::Paralyzed));
}

/// Test: Starting a new concentration spell ends the old one
#[test]
fn test_new_concentration_replaces_old() {
    let mut table = TestTable::new([10]);
    let mage = table.add(wizard("Ilsa"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let outcome = table
        .cast_spell(
            mage,
            &SpellRequest {
                spell: "invisibility".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(outcome.condition.unwrap().condition, Condition::Invisible);
    assert!(table.has(mage, Condition::Invisible));

    table.advance_to(gob);
    table.advance_to(mage);
    let outcome = table.cast_spell(mage, &hold_person(gob)).unwrap();
    assert_eq!(outcome.dropped_concentration.as_deref(), Some("invisibility"));
    assert!(!table.has(mage, Condition::Invisible));
    assert!(table.has(gob, Condition::Paralyzed));
}

/// Test: Unknown spells are rejected without spending the action
#[test]
fn test_unknown_spell_rejected() {
    let mut table = TestTable::new([]);
    let mage = table.add(wizard("Ilsa"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();
    let before = table.actions().len();

    let request = SpellRequest {
        spell: "wish".to_string(),
        target: Some(gob),
        ..Default::default()
    };
    let err = table.cast_spell(mage, &request).unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert_eq!(table.actions().len(), before);
    assert!(!table.participant(mage).unwrap().budget.action_used);
}

/// Test: Limited enemy spells run out; at-will spells don't
#[test]
fn test_enemy_spell_uses() {
    // Fighter fails the WIS save with 5, then sacred flame rolls 6
    let mut table = TestTable::new([5, 6]);
    let cultist = table.add(fanatic("Vesk"), 20);
    let hero = table.add(fighter("Brakka"), 5);
    table.start();

    table.cast_spell(cultist, &hold_person(hero)).unwrap();
    assert!(table.has(hero, Condition::Paralyzed));

    table.advance_to(hero);
    table.advance_to(cultist);
    let err = table.cast_spell(cultist, &hold_person(hero)).unwrap_err();
    assert_eq!(err.code(), "illegal_state");

    let flame = SpellRequest {
        spell: "sacred flame".to_string(),
        target: Some(hero),
        damage: Some("1d8 radiant".to_string()),
        save: Some(Ability::Dexterity),
        ..Default::default()
    };
    let outcome = table.cast_spell(cultist, &flame).unwrap();
    // Paralyzed creatures fail DEX saves without rolling
    assert!(outcome.save.unwrap().auto_failed);
    assert_eq!(table.hp(hero), 30 - 6);
    assert!(table.has(hero, Condition::Paralyzed), "hold person still held");
}

/// Test: Fireball catches creatures in its radius, each saving separately
#[test]
fn test_fireball() {
    // 8d6 of 3s, then the ogres' DEX saves
    let mut table = TestTable::new([3, 3, 3, 3, 3, 3, 3, 3, 4, 18]);
    let mage = table.add_at(wizard("Ilsa"), 0.0, 0.0, 20);
    let a = table.add_at(ogre("Grug"), 30.0, 30.0, 10);
    let b = table.add_at(ogre("Mog"), 35.0, 30.0, 5);
    table.start();

    let outcome = table.cast_aoe_spell(mage, &aoe("Fireball", 30.0, 30.0)).unwrap();
    assert_eq!(outcome.damage_roll.as_ref().unwrap().total, 24);
    let ids: Vec<ParticipantId> = outcome.targets.iter().map(|t| t.participant).collect();
    assert_eq!(ids, vec![a, b]);
    assert!(!outcome.targets[0].save.success);
    assert!(outcome.targets[1].save.success);
    assert_eq!(table.hp(a), 59 - 24);
    assert_eq!(table.hp(b), 59 - 12);
    assert_eq!(table.hp(mage), 18);

    assert_eq!(table.actions_of(ActionType::AoeSpell).len(), 1);
    assert_eq!(table.actions_of(ActionType::AreaEffect).len(), 2);
}

/// Test: The caster is caught by their own area spell
#[test]
fn test_fireball_catches_caster() {
    let mut table = TestTable::new([1, 1, 1, 1, 1, 1, 1, 1, 15, 2]);
    let mage = table.add_at(wizard("Ilsa"), 0.0, 0.0, 20);
    let gob = table.add_at(goblin("Snik"), 10.0, 0.0, 5);
    table.start();

    let outcome = table.cast_aoe_spell(mage, &aoe("fireball", 5.0, 0.0)).unwrap();
    assert_eq!(outcome.targets.len(), 2);
    assert_eq!(table.hp(mage), 18 - 4);
    assert!(table.participant(gob).unwrap().is_dead);
}

/// Test: Burning hands is a cone from the caster toward the aim point
#[test]
fn test_burning_hands_cone() {
    let mut table = TestTable::new([2, 2, 2, 18]);
    let mage = table.add_at(wizard("Ilsa"), 0.0, 0.0, 20);
    let gob = table.add_at(goblin("Snik"), 10.0, 0.0, 10);
    let brute = table.add_at(ogre("Grug"), 0.0, 10.0, 5);
    table.start();

    let outcome = table.cast_aoe_spell(mage, &aoe("burning hands", 15.0, 0.0)).unwrap();
    assert_eq!(outcome.targets.len(), 1);
    assert_eq!(outcome.targets[0].participant, gob);
    // Saved: half of 6
    assert_eq!(table.hp(gob), 4);
    assert_eq!(table.hp(brute), 59);
}

/// Test: Area spells without a template need an explicit shape
#[test]
fn test_aoe_without_shape_rejected() {
    let mut table = TestTable::new([]);
    let mage = table.add(wizard("Ilsa"), 20);
    table.add(goblin("Snik"), 5);
    table.start();

    let err = table.cast_aoe_spell(mage, &aoe("glitterdust", 0.0, 0.0)).unwrap_err();
    assert_eq!(err.code(), "validation_error");
}
