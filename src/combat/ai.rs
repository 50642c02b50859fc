//! Heuristic turn driver
//!
//! Decides what an automated combatant does: hit the weakest opponent with
//! its best attack, as many times as its multiattack allows. The session
//! calls these helpers and resolves the attacks itself.

use std::sync::LazyLock;

use regex::Regex;

use super::dice::DiceRoller;
use super::participant::ParticipantId;
use super::stats::{AttackOption, EnemyAbility};

/// Attack count when a multiattack gives no readable number
pub const DEFAULT_MULTIATTACK: u32 = 2;

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+|one|two|three|four|five|six|seven|eight)\b").unwrap());

fn word_to_count(word: &str) -> Option<u32> {
    match word.to_lowercase().as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        digits => digits.parse().ok(),
    }
}

/// Attacks per turn from a stat block's ability text.
///
/// Looks for an ability mentioning "multiattack" and takes the first
/// number (digits or a word) in its description.
pub fn multiattack_count(abilities: &[EnemyAbility]) -> u32 {
    let Some(multi) = abilities.iter().find(|a| {
        a.name.to_lowercase().contains("multiattack")
            || a.description.to_lowercase().contains("multiattack")
    }) else {
        return 1;
    };
    COUNT_RE
        .captures_iter(&multi.description)
        .filter_map(|c| c.get(1).and_then(|m| word_to_count(m.as_str())))
        .find(|n| *n > 0)
        .unwrap_or(DEFAULT_MULTIATTACK)
}

/// Lowest current HP wins; ties broken uniformly at random
pub fn select_target(
    candidates: &[(ParticipantId, i32)],
    roller: &mut dyn DiceRoller,
) -> Option<ParticipantId> {
    let lowest = candidates.iter().map(|(_, hp)| *hp).min()?;
    let tied: Vec<ParticipantId> = candidates
        .iter()
        .filter(|(_, hp)| *hp == lowest)
        .map(|(id, _)| *id)
        .collect();
    match tied.len() {
        1 => Some(tied[0]),
        n => {
            let pick = roller.roll_die(n as u32) as usize;
            tied.get(pick.saturating_sub(1)).copied()
        }
    }
}

/// Highest attack bonus, then highest average damage; the first listed wins ties
pub fn select_attack(attacks: &[AttackOption]) -> Option<&AttackOption> {
    attacks.iter().reduce(|best, a| {
        let key = (a.attack_bonus, a.damage.dice.average());
        if key > (best.attack_bonus, best.damage.dice.average()) {
            a
        } else {
            best
        }
    })
}
