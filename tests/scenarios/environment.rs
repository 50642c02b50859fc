//! Environment scenario tests
//!
//! Tests terrain costs, hazards, cover, lighting and weather

use crate::harness::{archer, fighter, goblin, TestTable};
use skirmish::combat::{
    AttackRequest, Condition, Cover, DamageType, EnvironmentKind, EnvironmentalEffect, Hazard, Lighting,
    Position, RollMode, Terrain, Weather,
};

/// Test: Mud doubles the cost of every foot moved through it
#[test]
fn test_mud_movement() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    table
        .add_environmental_effect(EnvironmentalEffect::in_area(
            EnvironmentKind::Terrain(Terrain::Mud),
            20.0,
            0.0,
            10.0,
        ))
        .unwrap();
    table.start();

    let outcome = table.move_participant(hero, Position::new(12.0, 0.0)).unwrap();
    assert_eq!(outcome.cost, 24.0);
    assert_eq!(outcome.movement_remaining, 6.0);
    assert_eq!(outcome.environment.terrain, Terrain::Mud);

    let err = table.move_participant(hero, Position::new(16.0, 0.0)).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
    assert_eq!(table.participant(hero).unwrap().position.x, 12.0);

    let outcome = table.move_participant(hero, Position::new(15.0, 0.0)).unwrap();
    assert_eq!(outcome.movement_remaining, 0.0);
}

/// Test: Placing participants before the fight costs nothing
#[test]
fn test_setup_movement_is_free() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);

    let outcome = table.move_participant(hero, Position::new(200.0, 0.0)).unwrap();
    assert_eq!(outcome.cost, 0.0);
    assert_eq!(outcome.movement_remaining, 30.0);
    assert!(outcome.hazards.is_empty());
}

/// Test: Walking into fire burns once, not on every step inside it
#[test]
fn test_fire_hazard() {
    // DEX save 5 + 1 = 6 vs 12 fails; 2d6 of 4s
    let mut table = TestTable::new([5, 4, 4]);
    let hero = table.add(fighter("Brakka"), 20);
    table
        .add_environmental_effect(EnvironmentalEffect::in_area(
            EnvironmentKind::Hazard(Hazard::Fire),
            10.0,
            0.0,
            5.0,
        ))
        .unwrap();
    table.start();

    let outcome = table.move_participant(hero, Position::new(10.0, 0.0)).unwrap();
    assert_eq!(outcome.hazards.len(), 1);
    let burn = &outcome.hazards[0];
    assert_eq!(burn.hazard, Hazard::Fire);
    assert!(!burn.save.success);
    assert_eq!(burn.damage.final_damage, 8);
    assert_eq!(burn.damage.damage_type, DamageType::Fire);
    assert_eq!(table.hp(hero), 22);

    let outcome = table.move_participant(hero, Position::new(11.0, 0.0)).unwrap();
    assert!(outcome.hazards.is_empty());
    assert_eq!(table.hp(hero), 22);
}

/// Test: Poison gas poisons for a round on a failed save
#[test]
fn test_poison_gas_hazard() {
    // CON save 3 + 2 = 5 vs 13 fails; 1d8 shows 5
    let mut table = TestTable::new([3, 5]);
    let hero = table.add(fighter("Brakka"), 20);
    table
        .add_environmental_effect(EnvironmentalEffect::in_area(
            EnvironmentKind::Hazard(Hazard::PoisonGas),
            10.0,
            0.0,
            5.0,
        ))
        .unwrap();
    table.start();

    let outcome = table.move_participant(hero, Position::new(10.0, 0.0)).unwrap();
    let gas = &outcome.hazards[0];
    assert_eq!(gas.condition.as_ref().unwrap().condition, Condition::Poisoned);
    assert_eq!(table.hp(hero), 25);
    assert!(table.has(hero, Condition::Poisoned));

    table.next_turn().unwrap();
    assert_eq!(table.current_round(), 2);
    assert!(!table.has(hero, Condition::Poisoned));
}

/// Test: Cover raises AC; full cover blocks the attack outright
#[test]
fn test_cover() {
    // 11 + 5 = 16 misses AC 15 + 2
    let mut table = TestTable::new([11]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    table.set_cover(gob, Some(Cover::Half)).unwrap();
    assert_eq!(table.participant(gob).unwrap().effective_ac(), Some(17));
    let outcome = table.attack(hero, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.target_ac, 17);
    assert!(!outcome.roll.hit);

    table.set_cover(gob, Some(Cover::Full)).unwrap();
    table.advance_to(gob);
    table.advance_to(hero);
    let err = table.attack(hero, gob, &AttackRequest::default()).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Test: Darkness hinders attackers without darkvision
#[test]
fn test_darkness() {
    let mut table = TestTable::new([18, 4]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table
        .add_environmental_effect(EnvironmentalEffect::global(EnvironmentKind::Lighting(Lighting::Darkness)))
        .unwrap();
    table.start();

    assert_eq!(table.local_environment(gob).unwrap().lighting, Lighting::Darkness);
    let outcome = table.attack(hero, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.d20.mode, RollMode::Disadvantage);
    assert!(!outcome.roll.hit);
}

/// Test: Rain takes 2 off ranged attacks
#[test]
fn test_rain_ranged_penalty() {
    // 12 + 5 - 2 = 15 just hits AC 15
    let mut table = TestTable::new([12, 5]);
    let bow = table.add(archer("Wren"), 20);
    let gob = table.add_at(goblin("Snik"), 60.0, 0.0, 5);
    table
        .add_environmental_effect(EnvironmentalEffect::global(EnvironmentKind::Weather(Weather::Rain)))
        .unwrap();
    table.start();

    let outcome = table.attack(bow, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.modifier, 3);
    assert_eq!(outcome.roll.total, 15);
    assert!(outcome.roll.hit);
    assert!(table.participant(gob).unwrap().is_dead);
}

/// Test: Weather covers the whole map and cannot be given an area
#[test]
fn test_weather_rejects_area() {
    let mut table = TestTable::new([]);
    table.add(fighter("Brakka"), 20);

    let effect = EnvironmentalEffect::in_area(EnvironmentKind::Weather(Weather::Fog), 0.0, 0.0, 30.0);
    let err = table.add_environmental_effect(effect).unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert!(table.environmental_effects().is_empty());
}

/// Test: Removing an effect restores what it covered
#[test]
fn test_remove_environmental_effect() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);

    let id = table
        .add_environmental_effect(EnvironmentalEffect::global(EnvironmentKind::Terrain(Terrain::Rubble)))
        .unwrap();
    assert_eq!(table.local_environment(hero).unwrap().terrain, Terrain::Rubble);

    let removed = table.remove_environmental_effect(id).unwrap();
    assert_eq!(removed.kind, EnvironmentKind::Terrain(Terrain::Rubble));
    assert_eq!(table.local_environment(hero).unwrap().terrain, Terrain::Normal);

    let err = table.remove_environmental_effect(id).unwrap_err();
    assert_eq!(err.code(), "not_found");
}
