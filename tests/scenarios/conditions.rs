//! Condition scenario tests
//!
//! Tests condition sources, durations, exhaustion, grappling and saving throws

use crate::harness::{archer, fighter, goblin, TestTable};
use skirmish::combat::{
    Ability, AttackRequest, Condition, ConditionDuration, Provenance, ReactionRequest, RollMode, SaveRequest,
};

/// Test: Removing a condition by source leaves other sources in place
#[test]
fn test_condition_sources() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);

    table
        .apply_condition(
            hero,
            Condition::Poisoned,
            ConditionDuration::Instant,
            Provenance::new("ray of sickness", Some(7)),
        )
        .unwrap();
    table
        .apply_condition(
            hero,
            Condition::Poisoned,
            ConditionDuration::Instant,
            Provenance::new("Poison Gas", None),
        )
        .unwrap();
    assert_eq!(table.participant(hero).unwrap().conditions.applications().len(), 2);

    let removed = table
        .remove_condition(hero, Condition::Poisoned, Some("RAY OF SICKNESS"))
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].source_participant, Some(7));
    assert!(table.has(hero, Condition::Poisoned), "gas still poisons");

    table
        .remove_condition(hero, Condition::Poisoned, Some("poison gas"))
        .unwrap();
    assert!(!table.has(hero, Condition::Poisoned));

    let err = table
        .remove_condition(hero, Condition::Poisoned, None)
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

/// Test: Exhaustion stacks; level 3 halves speed and hinders attacks
#[test]
fn test_exhaustion_levels() {
    // Disadvantage: 18 and 4, keep the 4
    let mut table = TestTable::new([18, 4]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    for _ in 0..3 {
        table
            .apply_condition(hero, Condition::Exhaustion, ConditionDuration::Instant, Provenance::default())
            .unwrap();
    }
    let p = table.participant(hero).unwrap();
    assert_eq!(p.exhaustion, 3);
    assert_eq!(p.effective_speed(), 15);
    assert!(p.attacks_with_disadvantage());

    let outcome = table.attack(hero, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.d20.mode, RollMode::Disadvantage);
    assert_eq!(outcome.roll.d20.natural, 4);
    assert!(!outcome.roll.hit);

    table.remove_condition(hero, Condition::Exhaustion, None).unwrap();
    let p = table.participant(hero).unwrap();
    assert_eq!(p.exhaustion, 0);
    assert_eq!(p.effective_speed(), 30);
}

/// Test: A stunned creature can neither act nor react
#[test]
fn test_stunned_cannot_act() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    table
        .apply_condition(gob, Condition::Stunned, ConditionDuration::Rounds(1), Provenance::default())
        .unwrap();
    let reaction = ReactionRequest {
        name: "Opportunity Attack".to_string(),
        target: Some(hero),
        attack: None,
    };
    let err = table.use_reaction(gob, &reaction).unwrap_err();
    assert_eq!(err.code(), "illegal_state");

    table.advance_to(gob);
    assert!(table.run_automated_turn().unwrap().is_empty());
    let err = table.attack(gob, hero, &AttackRequest::default()).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
    assert_eq!(table.hp(hero), 30);
}

/// Test: Round-limited conditions expire when their round starts
#[test]
fn test_condition_expires() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    table.add(goblin("Snik"), 5);
    table.start();

    let application = table
        .apply_condition(hero, Condition::Prone, ConditionDuration::Rounds(1), Provenance::new("shove", None))
        .unwrap();
    assert_eq!(application.applied_round, 1);
    assert_eq!(application.expires_at_round, Some(2));

    table.next_turn().unwrap();
    assert!(table.has(hero, Condition::Prone));
    table.next_turn().unwrap();
    assert_eq!(table.current_round(), 2);
    assert!(!table.has(hero, Condition::Prone));
}

/// Test: Grapple and escape are contested checks
#[test]
fn test_grapple_and_escape() {
    // Grapple: 15 + 5 = 20 vs 5 + 2 = 7; escape: 18 + 2 = 20 vs 3 + 5 = 8
    let mut table = TestTable::new([15, 5, 18, 3]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let outcome = table.grapple(hero, gob).unwrap();
    assert!(outcome.success);
    assert_eq!((outcome.attacker_total, outcome.defender_total), (20, 7));
    assert!(table.has(gob, Condition::Grappled));
    assert_eq!(table.participant(gob).unwrap().effective_speed(), 0);
    assert_eq!(table.participant(hero).unwrap().grappling, Some(gob));
    assert!(table.participant(hero).unwrap().budget.action_used);

    table.advance_to(gob);
    let outcome = table.escape_grapple(gob).unwrap();
    assert!(outcome.success);
    assert!(!table.has(gob, Condition::Grappled));
    assert_eq!(table.participant(hero).unwrap().grappling, None);
    assert_eq!(table.participant(gob).unwrap().grappled_by, None);

    let err = table.escape_grapple(gob).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Test: Ties in a grapple contest go to the defender
#[test]
fn test_grapple_tie_fails() {
    let mut table = TestTable::new([10, 13]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let outcome = table.grapple(hero, gob).unwrap();
    assert_eq!(outcome.attacker_total, outcome.defender_total);
    assert!(!outcome.success);
    assert!(!table.has(gob, Condition::Grappled));

    let err = table.grapple(hero, gob).unwrap_err();
    assert_eq!(err.code(), "illegal_state", "action already spent");
}

/// Test: A grapple ends when the grappled creature dies
#[test]
fn test_grapple_released_on_death() {
    let mut table = TestTable::new([15, 5, 15, 8]);
    let hero = table.add(fighter("Brakka"), 20);
    let bow = table.add(archer("Wren"), 15);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    assert!(table.grapple(hero, gob).unwrap().success);
    table.advance_to(bow);
    let outcome = table.attack(bow, gob, &AttackRequest::default()).unwrap();
    assert!(outcome.target_dropped);

    assert!(table.participant(gob).unwrap().is_dead);
    assert_eq!(table.participant(hero).unwrap().grappling, None);
}

/// Test: Restrained creatures make DEX saves at disadvantage
#[test]
fn test_restrained_dex_save() {
    let mut table = TestTable::new([15, 5]);
    let hero = table.add(fighter("Brakka"), 20);
    table.start();
    table
        .apply_condition(hero, Condition::Restrained, ConditionDuration::Instant, Provenance::new("web", None))
        .unwrap();

    let outcome = table
        .saving_throw(hero, &SaveRequest::new(Ability::Dexterity, 10))
        .unwrap();
    let d20 = outcome.roll.d20.as_ref().unwrap();
    assert_eq!(d20.mode, RollMode::Disadvantage);
    assert_eq!(outcome.roll.total, 6);
    assert!(!outcome.roll.success);
    assert_eq!(outcome.action.save_success, Some(false));
}

/// Test: Paralyzed creatures fail STR and DEX saves without rolling
#[test]
fn test_paralyzed_auto_fail() {
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    table.start();
    table
        .apply_condition(hero, Condition::Paralyzed, ConditionDuration::Instant, Provenance::default())
        .unwrap();

    let outcome = table
        .saving_throw(hero, &SaveRequest::new(Ability::Strength, 5))
        .unwrap();
    assert!(outcome.roll.auto_failed);
    assert!(outcome.roll.d20.is_none());
    assert!(!outcome.roll.success);
}

/// Test: Meeting the DC exactly is a success
#[test]
fn test_save_with_advantage() {
    let mut table = TestTable::new([4, 14]);
    let hero = table.add(fighter("Brakka"), 20);
    table.start();

    let request = SaveRequest {
        advantage: true,
        source: Some("trap".to_string()),
        ..SaveRequest::new(Ability::Dexterity, 15)
    };
    let outcome = table.saving_throw(hero, &request).unwrap();
    assert_eq!(outcome.roll.d20.as_ref().unwrap().natural, 14);
    assert_eq!(outcome.roll.total, 15);
    assert!(outcome.roll.success);
    assert_eq!(outcome.action.name.as_deref(), Some("trap"));
}
