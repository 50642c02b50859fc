//! A session with scripted dice

use std::ops::{Deref, DerefMut};

use skirmish::combat::{
    ActionType, CombatAction, CombatSession, Condition, FixedRoller, ParticipantId, Position, SessionRules,
    StatBlock,
};

/// A combat session whose d20s and damage dice come from a fixed script.
///
/// Once the script runs out every die shows 10 (clamped to its size).
pub struct TestTable {
    session: CombatSession,
}

impl TestTable {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self::with_roller(SessionRules::default(), FixedRoller::new(rolls))
    }

    pub fn with_rules(rules: SessionRules, rolls: impl IntoIterator<Item = u32>) -> Self {
        Self::with_roller(rules, FixedRoller::new(rolls))
    }

    pub fn with_roller(rules: SessionRules, roller: FixedRoller) -> Self {
        Self {
            session: CombatSession::new("test table", rules, Box::new(roller)),
        }
    }

    /// Add at the origin with a fixed initiative
    pub fn add(&mut self, stat_block: StatBlock, initiative: i32) -> ParticipantId {
        self.session
            .add_participant(stat_block, None, Some(initiative))
            .expect("Failed to add participant")
    }

    pub fn add_at(&mut self, stat_block: StatBlock, x: f64, y: f64, initiative: i32) -> ParticipantId {
        self.session
            .add_participant(stat_block, Some(Position::new(x, y)), Some(initiative))
            .expect("Failed to add participant")
    }

    pub fn start(&mut self) {
        self.session.start().expect("Failed to start session");
    }

    /// Advance turns until `id` is up
    pub fn advance_to(&mut self, id: ParticipantId) {
        for _ in 0..32 {
            if self.session.current_participant().map(|p| p.id).ok() == Some(id) {
                return;
            }
            self.session.next_turn().expect("Failed to advance turn");
        }
        panic!("{} never came up", id);
    }

    pub fn hp(&self, id: ParticipantId) -> i32 {
        self.session.participant(id).expect("no such participant").current_hp
    }

    pub fn has(&self, id: ParticipantId, condition: Condition) -> bool {
        self.session
            .participant(id)
            .expect("no such participant")
            .has_condition(condition)
    }

    pub fn last_action(&self) -> &CombatAction {
        self.session.actions().last().expect("no actions recorded")
    }

    pub fn actions_of(&self, action_type: ActionType) -> Vec<&CombatAction> {
        self.session
            .actions()
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }
}

impl Deref for TestTable {
    type Target = CombatSession;

    fn deref(&self) -> &CombatSession {
        &self.session
    }
}

impl DerefMut for TestTable {
    fn deref_mut(&mut self) -> &mut CombatSession {
        &mut self.session
    }
}
