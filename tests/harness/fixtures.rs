//! Stat block fixtures
//!
//! Numbers worth knowing when scripting dice:
//! - fighter: AC 11, longsword +5 for 1d8+3, 30 HP
//! - archer: AC 13, longbow +5 for 1d8+3 (ranged), 24 HP
//! - wizard: AC 12, spell DC 13, spell attack +5, CON save +1, 18 HP
//! - goblin: AC 15, scimitar +4 for 1d6+2, DEX save +2, WIS save -1, 7 HP
//! - ogre: AC 11, greatclub +6 for 2d8+4, DEX save -1, 59 HP
//! - dragon: AC 18, bite/claw/tail +10, three attacks, fire immune, 178 HP
//! - fanatic: AC 13, hold person once (DC 11), dagger +4 for 1d4+2, 33 HP

use skirmish::combat::{
    Ability, AbilityScores, Character, DamageType, Enemy, EnemyAttack, Item, LegendaryAction, StatBlock, Weapon,
};

fn weapon(name: &str, damage: &str, ranged: bool) -> Item {
    Item::Weapon(Weapon {
        name: name.to_string(),
        damage: damage.to_string(),
        finesse: false,
        two_handed: false,
        ranged,
        range: ranged.then_some(150),
        magic_bonus: 0,
    })
}

pub fn fighter(name: &str) -> StatBlock {
    let hero = Character::new(name, 30, AbilityScores::new(16, 12, 14, 10, 10, 10))
        .with_item(weapon("Longsword", "1d8 slashing", false));
    StatBlock::Character(hero)
}

pub fn archer(name: &str) -> StatBlock {
    let hero = Character::new(name, 24, AbilityScores::new(10, 16, 12, 10, 14, 8))
        .with_item(weapon("Longbow", "1d8 piercing", true));
    StatBlock::Character(hero)
}

pub fn wizard(name: &str) -> StatBlock {
    let hero = Character::new(name, 18, AbilityScores::new(8, 14, 12, 16, 12, 10)).with_spells(
        &[
            "fire bolt",
            "magic missile",
            "hold person",
            "invisibility",
            "web",
            "fireball",
            "burning hands",
        ],
        Ability::Intelligence,
    );
    StatBlock::Character(hero)
}

pub fn goblin(name: &str) -> StatBlock {
    let gob = Enemy::new(name, 7, 15, AbilityScores::new(8, 14, 10, 10, 8, 8))
        .with_attack("Scimitar", 4, "1d6+2 slashing");
    StatBlock::Enemy(gob)
}

pub fn ogre(name: &str) -> StatBlock {
    let ogre = Enemy::new(name, 59, 11, AbilityScores::new(19, 8, 16, 5, 7, 7))
        .with_attack("Greatclub", 6, "2d8+4 bludgeoning");
    StatBlock::Enemy(ogre)
}

pub fn dragon() -> StatBlock {
    let mut dragon = Enemy::new("Young Red Dragon", 178, 18, AbilityScores::new(23, 10, 21, 14, 11, 19))
        .with_attack("Bite", 10, "2d10+6 piercing")
        .with_attack("Claw", 10, "2d6+6 slashing")
        .with_trait(
            "Multiattack",
            "The dragon makes three attacks: one with its bite and two with its claws.",
        );
    dragon.attacks.push(EnemyAttack {
        name: "Tail".to_string(),
        bonus: 10,
        damage: "2d8+6 bludgeoning".to_string(),
        ranged: false,
    });
    dragon.challenge_rating = 10.0;
    dragon.immunities = vec![DamageType::Fire];
    dragon.save_proficiencies = vec![Ability::Dexterity, Ability::Constitution, Ability::Wisdom];
    dragon.legendary_action_count = 3;
    dragon.legendary_actions = vec![
        LegendaryAction {
            name: "Tail Attack".to_string(),
            cost: 1,
            description: "The dragon makes a tail attack.".to_string(),
            attack: Some("Tail".to_string()),
        },
        LegendaryAction {
            name: "Wing Attack".to_string(),
            cost: 2,
            description: "The dragon beats its wings.".to_string(),
            attack: None,
        },
    ];
    StatBlock::Enemy(dragon)
}

pub fn fanatic(name: &str) -> StatBlock {
    let mut cultist = Enemy::new(name, 33, 13, AbilityScores::new(11, 14, 12, 10, 13, 14))
        .with_attack("Dagger", 4, "1d4+2 piercing")
        .with_spell("hold person", 2, Some(1))
        .with_spell("sacred flame", 0, None);
    cultist.spell_save_dc = Some(11);
    StatBlock::Enemy(cultist)
}
