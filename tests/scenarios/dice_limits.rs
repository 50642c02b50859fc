//! Dice limit scenario tests
//!
//! Tests that oversized dice expressions are refused before they touch the
//! session, and that the largest legal rolls still resolve

use crate::harness::{fighter, ogre, wizard, TestTable};
use serde_json::Value;
use skirmish::combat::{
    AbilityScores, AoeRequest, AttackRequest, Enemy, ParticipantId, Point, SpellRequest, StatBlock,
};

fn state(table: &TestTable) -> Value {
    serde_json::to_value(table.snapshot()).expect("Failed to serialize snapshot")
}

/// Test: Healing with an oversized expression is refused and changes nothing
#[test]
fn test_heal_rejects_oversized_dice() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    table.add(ogre("Grug"), 5);
    table.start();
    let before = state(&table);

    for amount in ["1d6+2147483647", "4000000000d6", "3d4294967295", "101d4"] {
        let err = table.heal(hero, amount, None).unwrap_err();
        assert_eq!(err.code(), "validation_error", "{}", amount);
    }
    assert_eq!(state(&table), before);

    // A huge flat amount is capped at maximum HP
    let outcome = table.heal(hero, "2147483647", None).unwrap();
    assert_eq!(outcome.current_hp, 30);
}

/// Test: Spell damage beyond the dice limits leaves the caster's turn unspent
#[test]
fn test_spell_rejects_oversized_damage() {
    let mut table = TestTable::new([]);
    let mage = table.add(wizard("Ilsa"), 20);
    let brute = table.add(ogre("Grug"), 5);
    table.start();
    let before = state(&table);

    let request = SpellRequest {
        spell: "fire bolt".to_string(),
        target: Some(brute),
        damage: Some("500d10 fire".to_string()),
        attack_roll: true,
        ..Default::default()
    };
    let err = table.cast_spell(mage, &request).unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let area = AoeRequest {
        spell: "fireball".to_string(),
        target: Point::new(0.0, 0.0),
        shape: None,
        damage: Some("8d6+20000 fire".to_string()),
        save: None,
        dc: None,
        half_on_save: None,
    };
    let err = table.cast_aoe_spell(mage, &area).unwrap_err();
    assert_eq!(err.code(), "validation_error");

    assert_eq!(state(&table), before);
    assert!(!table.participant(mage).unwrap().budget.action_used);
}

/// Test: A stat block with an oversized attack is refused at the table
#[test]
fn test_stat_block_rejects_oversized_attack() {
    let mut table = TestTable::new([]);
    table.add(fighter("Brakka"), 20);

    let colossus = Enemy::new("Colossus", 400, 20, AbilityScores::new(30, 8, 30, 3, 10, 5))
        .with_attack("Stomp", 15, "1000d6 bludgeoning");
    let err = table
        .add_participant(StatBlock::Enemy(colossus), None, Some(5))
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert_eq!(table.participants().count(), 1);
}

/// Test: A critical on the largest legal attack doubles to 200 dice without overflow
#[test]
fn test_critical_on_largest_attack() {
    // Natural 20, then every d10 shows 10
    let mut table = TestTable::new([20]);
    let titan = Enemy::new("Titan", 300, 20, AbilityScores::new(30, 10, 30, 10, 10, 10))
        .with_attack("Maul", 12, "100d10+6 bludgeoning");
    let giant = table.add(StatBlock::Enemy(titan), 20);
    let brute = table.add(ogre("Grug"), 5);
    table.start();

    let outcome = table.attack(giant, brute, &AttackRequest::default()).unwrap();
    assert!(outcome.roll.critical);
    let damage = outcome.damage.unwrap();
    assert_eq!(damage.base_damage, 2006);
    assert_eq!(damage.final_damage, 2006);
    assert!(outcome.target_dropped);
    assert!(table.participant(brute).unwrap().is_dead);
    assert_eq!(table.last_action().target, Some(ParticipantId(2)));
}
