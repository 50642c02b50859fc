//! Recovery scenario tests
//!
//! Tests healing and death saving throws

use crate::harness::{fighter, goblin, ogre, wizard, TestTable};
use skirmish::combat::{ActionType, AttackRequest, ParticipantId};

/// Ogre hits the wizard for 8 + 8 + 4 = 20, dropping them to 0
fn wizard_down(rolls: &[u32]) -> (TestTable, ParticipantId, ParticipantId) {
    let mut script = vec![15, 8, 8];
    script.extend_from_slice(rolls);
    let mut table = TestTable::new(script);
    let brute = table.add(ogre("Grug"), 20);
    let mage = table.add(wizard("Ilsa"), 5);
    table.start();

    let outcome = table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(outcome.target_dropped);
    let p = table.participant(mage).unwrap();
    assert!(p.is_dying());
    assert!(!p.is_dead, "characters fall unconscious, not dead");
    assert_eq!(table.initiative_order(), vec![brute]);
    (table, brute, mage)
}

/// Test: Healing a dying character brings them back into the fight
#[test]
fn test_heal_dying_character() {
    let (mut table, brute, mage) = wizard_down(&[3, 4]);

    let outcome = table.heal(mage, "2d4+2", None).unwrap();
    assert_eq!(outcome.healed, 9);
    assert_eq!(outcome.current_hp, 9);
    assert!(table.participant(mage).unwrap().is_active);
    assert_eq!(table.initiative_order(), vec![brute, mage]);
    assert_eq!(table.last_action().action_type, ActionType::Heal);
}

/// Test: Healing is validated and capped at maximum HP
#[test]
fn test_heal_limits() {
    // 12 + 5 = 17 hits; d8 shows 6 for 9 damage, killing the goblin
    let mut table = TestTable::new([12, 6]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let err = table.heal(hero, "-3", None).unwrap_err();
    assert_eq!(err.code(), "validation_error");
    let err = table.heal(hero, "lots", None).unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let outcome = table.heal(hero, "5", Some(gob)).unwrap();
    assert_eq!(outcome.healed, 0);
    assert_eq!(outcome.current_hp, 30);
    assert_eq!(outcome.action.actor, Some(gob));

    table.attack(hero, gob, &AttackRequest::default()).unwrap();
    let err = table.heal(gob, "5", None).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Test: A natural 20 on a death save restores 1 HP
#[test]
fn test_death_save_natural_twenty() {
    let (mut table, brute, mage) = wizard_down(&[20]);

    let result = table.death_save(mage).unwrap();
    assert!(result.outcome.revived);
    assert_eq!(table.hp(mage), 1);
    assert_eq!(table.initiative_order(), vec![brute, mage]);
    assert!(result.action.critical);
}

/// Test: Three successes across three rounds stabilize a dying character
#[test]
fn test_death_saves_stabilize() {
    let (mut table, _brute, mage) = wizard_down(&[12, 13, 14]);

    let result = table.death_save(mage).unwrap();
    assert_eq!(result.outcome.successes, 1);
    let err = table.death_save(mage).unwrap_err();
    assert_eq!(err.code(), "illegal_state", "one save per round");

    table.next_turn().unwrap();
    assert_eq!(table.current_round(), 2);
    assert_eq!(table.death_save(mage).unwrap().outcome.successes, 2);

    table.next_turn().unwrap();
    let result = table.death_save(mage).unwrap();
    assert_eq!(result.outcome.successes, 3);
    assert!(result.outcome.is_stable);

    let p = table.participant(mage).unwrap();
    assert!(p.is_stable);
    assert_eq!(p.current_hp, 0);
    assert!(!p.is_active);
    let err = table.death_save(mage).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Test: A natural 1 counts as two failures; three kill
#[test]
fn test_death_save_failures() {
    let (mut table, _brute, mage) = wizard_down(&[1, 5]);

    assert_eq!(table.death_save(mage).unwrap().outcome.failures, 2);
    table.next_turn().unwrap();
    let result = table.death_save(mage).unwrap();
    assert!(result.outcome.is_dead);
    assert!(table.participant(mage).unwrap().is_dead);
    assert_eq!(table.actions_of(ActionType::DeathSave).len(), 2);
}
