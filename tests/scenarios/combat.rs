//! Combat scenario tests
//!
//! Tests weapon attacks, dying, reactions, legendary actions and automated battles

use crate::harness::{dragon, fighter, goblin, ogre, wizard, TestTable};
use skirmish::combat::{
    ActionType, AttackRequest, Condition, ConditionDuration, FinalStatus, FixedRoller, LegendaryRequest,
    Provenance, ReactionRequest, SessionRules, SessionStatus, Side,
};

/// Test: A longsword hit kills a goblin and removes it from the order
#[test]
fn test_attack_kills_goblin() {
    // d20 12 + 5 = 17 vs AC 15; d8 5 + 3 = 8
    let mut table = TestTable::new([12, 5]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let outcome = table.attack(hero, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.attack, "Longsword");
    assert!(outcome.roll.hit);
    assert_eq!(outcome.roll.total, 17);
    assert_eq!(outcome.damage.as_ref().unwrap().final_damage, 8);
    assert!(outcome.target_dropped);
    assert_eq!(outcome.target_hp, 0);

    assert!(table.participant(gob).unwrap().is_dead, "enemies die at 0 HP");
    assert_eq!(table.initiative_order(), vec![hero]);

    let action = table.last_action();
    assert_eq!(action.action_type, ActionType::Attack);
    assert_eq!(action.damage, Some(8));
}

/// Test: A natural 20 doubles the dice but not the bonus
#[test]
fn test_critical_hit() {
    let mut table = TestTable::new([20, 3, 4]);
    let hero = table.add(fighter("Brakka"), 20);
    let brute = table.add(ogre("Grug"), 5);
    table.start();

    let outcome = table.attack(hero, brute, &AttackRequest::default()).unwrap();
    assert!(outcome.roll.critical);
    let damage = outcome.damage.unwrap();
    assert!(damage.is_critical);
    assert_eq!(damage.final_damage, 3 + 4 + 3);
    assert_eq!(table.hp(brute), 49);
    assert!(table.last_action().critical);
}

/// Test: Named attacks, the unarmed fallback, and unknown names
#[test]
fn test_attack_by_name() {
    let mut table = TestTable::new([15, 3]);
    let hero = table.add(fighter("Brakka"), 20);
    let brute = table.add(ogre("Grug"), 5);
    table.start();

    let request = AttackRequest {
        attack: Some("Greataxe".to_string()),
        ..Default::default()
    };
    let err = table.attack(hero, brute, &request).unwrap_err();
    assert_eq!(err.code(), "not_found");

    let request = AttackRequest {
        attack: Some("unarmed".to_string()),
        ..Default::default()
    };
    let outcome = table.attack(hero, brute, &request).unwrap();
    assert_eq!(outcome.attack, "Unarmed Strike");
    // 1d4 + STR 3
    assert_eq!(table.hp(brute), 59 - 6);
}

/// Test: Advantage and disadvantage cancel to a single d20
#[test]
fn test_advantage_and_disadvantage_cancel() {
    let mut table = TestTable::new([9, 19]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let request = AttackRequest {
        advantage: true,
        disadvantage: true,
        ..Default::default()
    };
    let outcome = table.attack(hero, gob, &request).unwrap();
    assert_eq!(outcome.roll.d20.rolls, vec![9]);
    assert!(!outcome.roll.hit);
    assert_eq!(table.hp(gob), 7);
}

/// Test: Melee attacks against a prone target roll with advantage
#[test]
fn test_prone_target_melee_advantage() {
    let mut table = TestTable::new([3, 16, 2]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();
    table
        .apply_condition(gob, Condition::Prone, ConditionDuration::Instant, Provenance::new("shove", Some(hero.0)))
        .unwrap();

    let outcome = table.attack(hero, gob, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.d20.rolls, vec![3, 16]);
    assert_eq!(outcome.roll.d20.natural, 16);
    assert!(outcome.roll.hit);
    assert_eq!(table.hp(gob), 2);
}

/// Test: Melee hits on a paralyzed creature are critical
#[test]
fn test_paralyzed_target_auto_crit() {
    let mut table = TestTable::new([4, 11, 2, 3]);
    let hero = table.add(fighter("Brakka"), 20);
    let brute = table.add(ogre("Grug"), 5);
    table.start();
    table
        .apply_condition(brute, Condition::Paralyzed, ConditionDuration::Instant, Provenance::default())
        .unwrap();

    let outcome = table.attack(hero, brute, &AttackRequest::default()).unwrap();
    assert_eq!(outcome.roll.d20.natural, 11);
    assert!(outcome.roll.critical);
    assert_eq!(table.hp(brute), 59 - 8);
}

/// Test: A character dropped to 0 HP is dying; more damage adds failures
#[test]
fn test_damage_while_dying() {
    // Ogre hits for 20, then hits the dying wizard for 6, then a death save of 4
    let mut table = TestTable::new([15, 8, 8, 15, 1, 1, 4]);
    let brute = table.add(ogre("Grug"), 20);
    let mage = table.add(wizard("Ilsa"), 5);
    table.start();

    let outcome = table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(outcome.target_dropped);
    let p = table.participant(mage).unwrap();
    assert!(p.is_dying());
    assert!(!p.is_active);
    assert!(!p.is_dead);
    assert_eq!(table.initiative_order(), vec![brute]);

    // Only the ogre is left in the order, so this starts round 2
    table.next_turn().unwrap();
    assert_eq!(table.current_round(), 2);

    let outcome = table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(!outcome.target_dropped);
    assert_eq!(table.participant(mage).unwrap().death_saves.failures, 1);

    let save = table.death_save(mage).unwrap();
    assert!(!save.outcome.success);
    assert_eq!(save.outcome.failures, 2);

    let again = table.death_save(mage).unwrap_err();
    assert_eq!(again.code(), "illegal_state");
}

/// Test: Massive damage kills outright unless the rule is off
#[test]
fn test_massive_damage() {
    // Critical greatclub: 4d8 + 4 = 36, leaving 18 over the wizard's 18 HP
    let script = [20, 8, 8, 8, 8];

    let mut table = TestTable::new(script);
    let brute = table.add(ogre("Grug"), 20);
    let mage = table.add(wizard("Ilsa"), 5);
    table.start();
    table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(table.participant(mage).unwrap().is_dead);

    let rules = SessionRules {
        massive_damage: false,
        ..SessionRules::default()
    };
    let mut table = TestTable::with_rules(rules, script);
    let brute = table.add(ogre("Grug"), 20);
    let mage = table.add(wizard("Ilsa"), 5);
    table.start();
    table.attack(brute, mage, &AttackRequest::default()).unwrap();
    assert!(table.participant(mage).unwrap().is_dying());
}

/// Test: Dead creatures can't be attacked
#[test]
fn test_attack_dead_target_rejected() {
    let mut table = TestTable::new([12, 5]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    let brute = table.add(ogre("Grug"), 1);
    table.start();
    table.attack(hero, gob, &AttackRequest::default()).unwrap();

    table.advance_to(brute);
    let err = table.attack(brute, gob, &AttackRequest::default()).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
    assert!(!table.participant(brute).unwrap().budget.action_used);
}

/// Test: One reaction per round, restored at the start of the reactor's turn
#[test]
fn test_reaction_once_per_round() {
    let mut table = TestTable::new([15, 3]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);
    table.start();

    let request = ReactionRequest {
        name: "Opportunity Attack".to_string(),
        target: Some(hero),
        attack: None,
    };
    let outcome = table.use_reaction(gob, &request).unwrap();
    let attack = outcome.attack.unwrap();
    assert!(attack.roll.hit);
    assert_eq!(table.hp(hero), 25);
    assert_eq!(outcome.action.action_type, ActionType::Reaction);
    assert_eq!(outcome.action.name.as_deref(), Some("Opportunity Attack"));

    let err = table.use_reaction(gob, &request).unwrap_err();
    assert_eq!(err.code(), "illegal_state");

    table.next_turn().unwrap();
    let parry = ReactionRequest {
        name: "Parry".to_string(),
        ..Default::default()
    };
    let outcome = table.use_reaction(gob, &parry).unwrap();
    assert!(outcome.attack.is_none());
}

/// Test: Legendary actions spend points on other creatures' turns
#[test]
fn test_legendary_actions() {
    // Tail: d20 15 + 10 vs AC 11; 2d8 4, 4 + 6
    let mut table = TestTable::new([15, 4, 4]);
    let hero = table.add(fighter("Brakka"), 20);
    let wyrm = table.add(dragon(), 5);
    table.start();

    let tail = LegendaryRequest {
        action: "Tail Attack".to_string(),
        target: Some(hero),
    };
    let outcome = table.use_legendary_action(wyrm, &tail).unwrap();
    assert_eq!(outcome.cost, 1);
    assert_eq!(outcome.remaining, 2);
    assert_eq!(outcome.attack.unwrap().attack, "Tail");
    assert_eq!(table.hp(hero), 30 - 14);

    let wings = LegendaryRequest {
        action: "Wing Attack".to_string(),
        target: None,
    };
    assert_eq!(table.use_legendary_action(wyrm, &wings).unwrap().remaining, 0);

    let err = table.use_legendary_action(wyrm, &tail).unwrap_err();
    assert_eq!(err.code(), "illegal_state");

    table.next_turn().unwrap();
    assert_eq!(table.participant(wyrm).unwrap().legendary_actions_remaining, 3);
    let err = table.use_legendary_action(wyrm, &wings).unwrap_err();
    assert_eq!(err.code(), "illegal_state");
}

/// Test: Multiattack makes one attack per count, retargeting the weakest
#[test]
fn test_automated_multiattack() {
    // Tie break picks the first fighter, then bite hit, fumble, bite hit
    let mut table = TestTable::new([1, 15, 5, 5, 1, 15, 3, 3]);
    let wyrm = table.add(dragon(), 20);
    let a = table.add(fighter("Brakka"), 10);
    let b = table.add(fighter("Tova"), 5);
    table.start();

    let actions = table.run_automated_turn().unwrap();
    assert_eq!(actions.len(), 3);
    assert!(actions.iter().all(|act| act.actor == Some(wyrm)));
    assert!(actions.iter().all(|act| act.target == Some(a)));
    assert_eq!(actions[1].hit, Some(false));
    assert_eq!(table.hp(a), 30 - 16 - 12);
    assert_eq!(table.hp(b), 30);

    assert!(table.run_automated_turn().unwrap().is_empty(), "action already spent");
}

/// Test: An automated battle runs to a victory and reports it
#[test]
fn test_run_battle_victory() {
    // Every die shows 10: 15 hits AC 15, the d8 clamps to 8
    let mut table = TestTable::new([]);
    let hero = table.add(fighter("Brakka"), 20);
    let gob = table.add(goblin("Snik"), 5);

    let report = table.run_battle().unwrap();
    assert_eq!(table.status(), SessionStatus::Ended);
    assert_eq!(report.outcome.victors, Some(Side::Party));
    assert_eq!(report.outcome.survivors, vec![hero]);
    assert_eq!(report.outcome.casualties, vec![gob]);
    assert_eq!(report.total_rounds, 1);

    let summary = report.participant(hero).unwrap();
    assert_eq!(summary.damage_dealt, 11);
    assert_eq!(summary.attacks_made, 1);
    assert_eq!(summary.attacks_hit, 1);
    assert_eq!(report.participant(gob).unwrap().status, FinalStatus::Dead);
}

/// Test: The round limit stops a battle nobody can win
#[test]
fn test_run_battle_round_limit() {
    let rules = SessionRules {
        max_rounds: 3,
        ..SessionRules::default()
    };
    let mut table = TestTable::with_roller(rules, FixedRoller::new([]).with_fallback(1));
    table.add(fighter("Brakka"), 20);
    table.add(goblin("Snik"), 5);

    let report = table.run_battle().unwrap();
    assert_eq!(table.actions_of(ActionType::Attack).len(), 6);
    assert_eq!(report.outcome.victors, None);
    assert_eq!(report.outcome.survivors.len(), 2);
}
