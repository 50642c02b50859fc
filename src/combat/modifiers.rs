//! Roll modifier stacking
//!
//! Cover, light, weather, conditions and caller-supplied effects each
//! produce a [`RollModifier`]. They are collected into a [`ModifierStack`]
//! and folded with one rule: advantage and disadvantage cancel pairwise,
//! numeric bonuses sum. Order never matters.

use serde::{Deserialize, Serialize};

use super::dice::RollMode;

/// A single effect on a d20 roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollModifier {
    Advantage,
    Disadvantage,
    Bonus(i32),
}

/// A named modifier, kept for the action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedModifier {
    pub source: String,
    pub modifier: RollModifier,
}

/// Every modifier that applies to one roll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierStack {
    entries: Vec<SourcedModifier>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Into<String>, modifier: RollModifier) {
        self.entries.push(SourcedModifier {
            source: source.into(),
            modifier,
        });
    }

    /// Push only when a lookup produced something
    pub fn push_opt(&mut self, source: impl Into<String>, modifier: Option<RollModifier>) {
        if let Some(m) = modifier {
            self.push(source, m);
        }
    }

    pub fn with(mut self, source: impl Into<String>, modifier: RollModifier) -> Self {
        self.push(source, modifier);
        self
    }

    pub fn entries(&self) -> &[SourcedModifier] {
        &self.entries
    }

    fn count(&self, wanted: RollModifier) -> i32 {
        self.entries.iter().filter(|e| e.modifier == wanted).count() as i32
    }

    /// Net roll mode after pairwise cancellation
    pub fn mode(&self) -> RollMode {
        let net = self.count(RollModifier::Advantage) - self.count(RollModifier::Disadvantage);
        match net {
            n if n > 0 => RollMode::Advantage,
            n if n < 0 => RollMode::Disadvantage,
            _ => RollMode::Normal,
        }
    }

    /// Sum of all numeric bonuses
    pub fn bonus(&self) -> i32 {
        self.entries
            .iter()
            .map(|e| match e.modifier {
                RollModifier::Bonus(b) => b,
                _ => 0,
            })
            .sum()
    }

    /// Names of the contributing sources, for descriptions
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|e| match e.modifier {
                RollModifier::Advantage => format!("{} (adv)", e.source),
                RollModifier::Disadvantage => format!("{} (dis)", e.source),
                RollModifier::Bonus(b) => format!("{} ({:+})", e.source, b),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
