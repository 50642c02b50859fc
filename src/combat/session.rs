//! Combat session state machine
//!
//! A session moves `preparing -> active -> ended`. While preparing,
//! participants are added and initiative is set. While active, every
//! operation validates first and mutates second, so a rejected request
//! leaves the session untouched. Each resolved action is appended to the
//! session log and offered to the configured [`ActionSink`].
//!
//! The turn order is derived on demand: active participants by initiative
//! descending, ties by ascending id. Participants dropping out shrink the
//! order without renumbering anything.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ai;
use super::aoe::{aoe_spell, AoeCandidate, AoeShape, Point};
use super::conditions::{
    self, Condition, ConditionApplication, ConditionDuration, Provenance,
};
use super::damage::{DamageResult, DamageType};
use super::dice::{parse_damage, parse_dice, DamageDice, DiceRoller};
use super::environment::{
    calculate_movement_cost, lighting_modifier, weather_modifier, Cover, CoverEffect, Environment,
    EnvironmentalEffect, Hazard, LocalEnvironment,
};
use super::error::{CombatError, CombatResult};
use super::log::{ActionBuilder, ActionSink, ActionType, CombatAction, TracingSink};
use super::modifiers::{ModifierStack, RollModifier};
use super::participant::{
    CombatParticipant, DamageTaken, DeathSaveOutcome, ParticipantId, Position,
};
use super::report::{build_report, CombatReport};
use super::resolve::{self, AttackRoll, DamageRoll, SaveRoll};
use super::stats::{Ability, AttackOption, Combatant, Side, StatBlock};

/// Source name recorded on grapple conditions
const GRAPPLE_SOURCE: &str = "grapple";

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Preparing,
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Preparing => "preparing",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// Table rules a session runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRules {
    /// Characters die outright when leftover damage reaches their max HP
    pub massive_damage: bool,
    /// Automated battles stop after this many rounds
    pub max_rounds: u32,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            massive_damage: true,
            max_rounds: 50,
        }
    }
}

/// Parameters of a weapon attack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    /// Attack to use; the highest-bonus one when omitted
    #[serde(default)]
    pub attack: Option<String>,
    #[serde(default)]
    pub advantage: bool,
    #[serde(default)]
    pub disadvantage: bool,
    /// Extra effects from outside the engine (bless, bardic inspiration)
    #[serde(default)]
    pub modifiers: Vec<RollModifier>,
}

/// A concentration save forced by damage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationCheck {
    pub participant: ParticipantId,
    pub spell: String,
    pub dc: i32,
    pub save: SaveRoll,
    pub maintained: bool,
    pub action: CombatAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub action: CombatAction,
    pub attack: String,
    pub roll: AttackRoll,
    pub damage: Option<DamageResult>,
    pub target_hp: i32,
    pub target_dropped: bool,
    pub concentration: Option<ConcentrationCheck>,
}

/// Parameters of a single-target (or self) spell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellRequest {
    pub spell: String,
    #[serde(default)]
    pub target: Option<ParticipantId>,
    /// Damage expression, e.g. "3d10 fire"
    #[serde(default)]
    pub damage: Option<String>,
    /// Save the target makes; defaults to the spell's known condition save
    #[serde(default)]
    pub save: Option<Ability>,
    /// Resolve as a spell attack against AC instead of a save
    #[serde(default)]
    pub attack_roll: bool,
    #[serde(default)]
    pub half_on_save: Option<bool>,
    #[serde(default)]
    pub concentration: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellOutcome {
    pub action: CombatAction,
    pub attack: Option<AttackRoll>,
    pub save: Option<SaveRoll>,
    pub damage: Option<DamageResult>,
    pub condition: Option<ConditionApplication>,
    /// Spell dropped because this one needs concentration
    pub dropped_concentration: Option<String>,
    pub concentration: Option<ConcentrationCheck>,
}

/// Parameters of an area spell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoeRequest {
    pub spell: String,
    /// Point of origin or aim point, depending on the shape
    pub target: Point,
    /// Explicit shape, required for spells without a template
    #[serde(default)]
    pub shape: Option<AoeShape>,
    #[serde(default)]
    pub damage: Option<String>,
    #[serde(default)]
    pub save: Option<Ability>,
    #[serde(default)]
    pub dc: Option<i32>,
    #[serde(default)]
    pub half_on_save: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoeTargetResult {
    pub participant: ParticipantId,
    pub distance: f64,
    pub save: SaveRoll,
    pub damage: Option<DamageResult>,
    pub condition: Option<ConditionApplication>,
    pub action: CombatAction,
    pub concentration: Option<ConcentrationCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoeOutcome {
    pub action: CombatAction,
    pub damage_roll: Option<DamageRoll>,
    pub targets: Vec<AoeTargetResult>,
}

/// Parameters of a standalone saving throw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub ability: Ability,
    pub dc: i32,
    #[serde(default)]
    pub advantage: bool,
    #[serde(default)]
    pub disadvantage: bool,
    #[serde(default)]
    pub modifiers: Vec<RollModifier>,
    /// What forced the save
    #[serde(default)]
    pub source: Option<String>,
}

impl SaveRequest {
    pub fn new(ability: Ability, dc: i32) -> Self {
        Self {
            ability,
            dc,
            advantage: false,
            disadvantage: false,
            modifiers: Vec::new(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub action: CombatAction,
    pub roll: SaveRoll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathSaveResult {
    pub action: CombatAction,
    pub outcome: DeathSaveOutcome,
}

/// A reaction, optionally an opportunity attack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub name: String,
    /// Attack this participant as part of the reaction
    #[serde(default)]
    pub target: Option<ParticipantId>,
    #[serde(default)]
    pub attack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    pub action: CombatAction,
    pub attack: Option<AttackOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendaryRequest {
    pub action: String,
    #[serde(default)]
    pub target: Option<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendaryOutcome {
    pub action: CombatAction,
    pub cost: u32,
    pub remaining: u32,
    pub attack: Option<AttackOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrappleOutcome {
    pub action: CombatAction,
    pub success: bool,
    pub attacker_total: i32,
    pub defender_total: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardOutcome {
    pub hazard: Hazard,
    pub save: SaveRoll,
    pub damage: DamageResult,
    pub condition: Option<ConditionApplication>,
    pub action: CombatAction,
    pub concentration: Option<ConcentrationCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub action: CombatAction,
    pub from: Position,
    pub to: Position,
    /// Feet of movement spent
    pub cost: f64,
    pub movement_remaining: f64,
    pub environment: LocalEnvironment,
    pub hazards: Vec<HazardOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealOutcome {
    pub action: CombatAction,
    pub healed: i32,
    pub current_hp: i32,
}

/// Serializable view of a whole session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub current_turn_index: usize,
    pub current_participant: Option<ParticipantId>,
    pub initiative_order: Vec<ParticipantId>,
    pub participants: Vec<CombatParticipant>,
    pub environment: Vec<EnvironmentalEffect>,
    pub action_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One fight
pub struct CombatSession {
    id: Uuid,
    name: String,
    status: SessionStatus,
    current_round: u32,
    current_turn_index: usize,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    participants: BTreeMap<ParticipantId, CombatParticipant>,
    next_participant_id: u32,
    next_condition_id: u64,
    environment: Environment,
    actions: Vec<CombatAction>,
    report: Option<CombatReport>,
    rules: SessionRules,
    roller: Box<dyn DiceRoller>,
    sink: Arc<dyn ActionSink>,
}

impl fmt::Debug for CombatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("round", &self.current_round)
            .field("turn", &self.current_turn_index)
            .field("participants", &self.participants.len())
            .finish_non_exhaustive()
    }
}

impl CombatSession {
    /// Create a session in `preparing`
    pub fn new(name: &str, rules: SessionRules, roller: Box<dyn DiceRoller>) -> Self {
        Self::with_sink(name, rules, roller, Arc::new(TracingSink))
    }

    pub fn with_sink(
        name: &str,
        rules: SessionRules,
        roller: Box<dyn DiceRoller>,
        sink: Arc<dyn ActionSink>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("Created combat session {} ({})", id, name);
        Self {
            id,
            name: name.to_string(),
            status: SessionStatus::Preparing,
            current_round: 0,
            current_turn_index: 0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            participants: BTreeMap::new(),
            next_participant_id: 0,
            next_condition_id: 0,
            environment: Environment::new(),
            actions: Vec::new(),
            report: None,
            rules,
            roller,
            sink,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    pub fn rules(&self) -> SessionRules {
        self.rules
    }

    pub fn actions(&self) -> &[CombatAction] {
        &self.actions
    }

    pub fn participants(&self) -> impl Iterator<Item = &CombatParticipant> {
        self.participants.values()
    }

    pub fn participant(&self, id: ParticipantId) -> CombatResult<&CombatParticipant> {
        self.participants
            .get(&id)
            .ok_or_else(|| CombatError::not_found(format!("participant {}", id)))
    }

    fn participant_mut(&mut self, id: ParticipantId) -> CombatResult<&mut CombatParticipant> {
        self.participants
            .get_mut(&id)
            .ok_or_else(|| CombatError::not_found(format!("participant {}", id)))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            current_round: self.current_round,
            current_turn_index: self.current_turn_index,
            current_participant: self.current_id(),
            initiative_order: self.initiative_order(),
            participants: self.participants.values().cloned().collect(),
            environment: self.environment.effects().to_vec(),
            action_count: self.actions.len(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    // ---- guards ----

    fn require_status(&self, wanted: SessionStatus) -> CombatResult<()> {
        if self.status != wanted {
            return Err(CombatError::illegal_state(format!(
                "session is {}, expected {}",
                self.status, wanted
            )));
        }
        Ok(())
    }

    fn require_not_ended(&self) -> CombatResult<()> {
        if self.status == SessionStatus::Ended {
            return Err(CombatError::illegal_state("session has ended"));
        }
        Ok(())
    }

    fn require_turn(&self, id: ParticipantId) -> CombatResult<()> {
        match self.current_id() {
            Some(current) if current == id => Ok(()),
            Some(current) => Err(CombatError::illegal_state(format!(
                "it is {}'s turn, not {}'s",
                self.participant(current)?.name(),
                self.participant(id)?.name()
            ))),
            None => Err(CombatError::illegal_state("no participant is up; advance the turn")),
        }
    }

    /// The participant must be able to act and still have its action
    fn require_action(&self, id: ParticipantId) -> CombatResult<&CombatParticipant> {
        let p = self.participant(id)?;
        if !p.can_act() {
            return Err(CombatError::illegal_state(format!("{} cannot act", p.name())));
        }
        if p.budget.action_used {
            return Err(CombatError::illegal_state(format!(
                "{} already used their action this turn",
                p.name()
            )));
        }
        Ok(p)
    }

    // ---- bookkeeping ----

    fn record(&mut self, builder: ActionBuilder) -> CombatAction {
        let action = builder.build(
            self.actions.len() as u64 + 1,
            self.id,
            self.current_round,
            self.current_turn_index,
        );
        if let Err(e) = self.sink.record(&action) {
            warn!("Failed to record action {} for session {}: {}", action.id, self.id, e);
        }
        self.actions.push(action.clone());
        action
    }

    fn refresh_environment(&mut self) {
        for p in self.participants.values_mut() {
            p.environment = self.environment.state_at(p.position.x, p.position.y);
        }
    }

    fn attach_condition(
        &mut self,
        target: ParticipantId,
        condition: Condition,
        duration: ConditionDuration,
        provenance: Provenance,
    ) -> CombatResult<ConditionApplication> {
        self.participant(target)?;
        self.next_condition_id += 1;
        let application = ConditionApplication {
            id: self.next_condition_id,
            condition,
            applied_round: self.current_round,
            applied_turn: self.current_turn_index,
            duration,
            expires_at_round: match duration {
                ConditionDuration::Rounds(n) => Some(self.current_round + n),
                _ => None,
            },
            source: provenance.source,
            source_participant: provenance.source_participant,
        };
        let p = self.participant_mut(target)?;
        if condition == Condition::Exhaustion {
            p.add_exhaustion();
        }
        Ok(p.conditions.apply(application))
    }

    /// End a caster's concentration and everything hanging off it
    fn end_concentration(&mut self, caster: ParticipantId) -> Option<String> {
        let spell = self.participants.get_mut(&caster)?.break_concentration()?;
        for p in self.participants.values_mut() {
            p.conditions.remove_concentration(caster.0, &spell);
        }
        debug!("{} lost concentration on {}", caster, spell);
        Some(spell)
    }

    fn release_grapples(&mut self, id: ParticipantId) {
        let Some(p) = self.participants.get_mut(&id) else {
            return;
        };
        let (grappling, grappled_by) = (p.grappling.take(), p.grappled_by.take());
        if grappled_by.is_some() {
            p.conditions.remove(Condition::Grappled, Some(GRAPPLE_SOURCE));
        }
        if let Some(t) = grappling.and_then(|t| self.participants.get_mut(&t)) {
            t.grappled_by = None;
            t.conditions.remove(Condition::Grappled, Some(GRAPPLE_SOURCE));
        }
        if let Some(g) = grappled_by.and_then(|g| self.participants.get_mut(&g)) {
            g.grappling = None;
        }
    }

    /// Reduce HP and clean up after a creature that drops
    fn apply_damage(
        &mut self,
        id: ParticipantId,
        amount: i32,
        critical: bool,
    ) -> CombatResult<DamageTaken> {
        let massive = self.rules.massive_damage;
        let taken = self.participant_mut(id)?.take_damage(amount, critical, massive);
        if taken.dropped || taken.died {
            self.end_concentration(id);
            self.release_grapples(id);
            info!(
                "{} {}",
                self.participant(id)?.name(),
                if taken.died { "dies" } else { "drops to 0 HP" }
            );
        }
        Ok(taken)
    }

    /// Roll the concentration save owed after damage, if any
    fn concentration_check(
        &mut self,
        id: ParticipantId,
        taken: Option<DamageTaken>,
    ) -> CombatResult<Option<ConcentrationCheck>> {
        let Some(dc) = taken.and_then(|t| t.concentration_dc) else {
            return Ok(None);
        };
        let p = self.participant(id)?.clone();
        let Some(concentration) = p.concentration.clone() else {
            return Ok(None);
        };
        let (stack, auto_fail) = save_modifiers(&p, Ability::Constitution, false, false, &[]);
        let bonus = p.stat_block.save_bonus(Ability::Constitution);
        let save = resolve::saving_throw(self.roller.as_mut(), bonus, dc, &stack, auto_fail);
        if !save.success {
            self.end_concentration(id);
        }
        let action = self.record(
            ActionBuilder::new(ActionType::Concentration)
                .actor(id, p.name())
                .name(&concentration.spell)
                .save(Ability::Constitution, dc, save_total(&save), save.success)
                .description(format!(
                    "{} {} concentration on {} (DC {})",
                    p.name(),
                    if save.success { "keeps" } else { "loses" },
                    concentration.spell,
                    dc
                )),
        );
        Ok(Some(ConcentrationCheck {
            participant: id,
            spell: concentration.spell,
            dc,
            maintained: save.success,
            save,
            action,
        }))
    }

    // ---- setup ----

    /// Add a combatant; only while preparing
    pub fn add_participant(
        &mut self,
        stat_block: StatBlock,
        position: Option<Position>,
        initiative: Option<i32>,
    ) -> CombatResult<ParticipantId> {
        self.require_status(SessionStatus::Preparing)?;
        stat_block.validate()?;
        self.next_participant_id += 1;
        let id = ParticipantId(self.next_participant_id);
        let mut p = CombatParticipant::new(id, stat_block);
        p.initiative = initiative;
        if let Some(pos) = position {
            p.position = pos;
        }
        p.environment = self.environment.state_at(p.position.x, p.position.y);
        debug!("Added {} as {} to session {}", p.name(), id, self.id);
        self.participants.insert(id, p);
        Ok(id)
    }

    /// Roll d20 + DEX for everyone without an initiative yet
    pub fn roll_initiative(&mut self) -> CombatResult<Vec<(ParticipantId, i32)>> {
        self.require_status(SessionStatus::Preparing)?;
        let pending: Vec<(ParticipantId, String, i32)> = self
            .participants
            .values()
            .filter(|p| p.initiative.is_none())
            .map(|p| {
                (
                    p.id,
                    p.name().to_string(),
                    p.stat_block.ability_modifier(Ability::Dexterity),
                )
            })
            .collect();
        for (id, name, dex) in pending {
            let natural = self.roller.d20();
            let total = natural as i32 + dex;
            self.participant_mut(id)?.initiative = Some(total);
            self.record(
                ActionBuilder::new(ActionType::Initiative)
                    .actor(id, &name)
                    .roll(natural, dex, total)
                    .description(format!("{} rolls {} for initiative", name, total)),
            );
        }
        Ok(self
            .participants
            .values()
            .filter_map(|p| p.initiative.map(|i| (p.id, i)))
            .collect())
    }

    pub fn set_initiative(&mut self, id: ParticipantId, initiative: i32) -> CombatResult<()> {
        self.require_status(SessionStatus::Preparing)?;
        self.participant_mut(id)?.initiative = Some(initiative);
        Ok(())
    }

    /// Active participants by initiative descending, ties by id
    pub fn initiative_order(&self) -> Vec<ParticipantId> {
        let mut order: Vec<&CombatParticipant> =
            self.participants.values().filter(|p| p.is_active).collect();
        order.sort_by(|a, b| {
            b.initiative
                .unwrap_or(i32::MIN)
                .cmp(&a.initiative.unwrap_or(i32::MIN))
                .then(a.id.cmp(&b.id))
        });
        order.into_iter().map(|p| p.id).collect()
    }

    fn current_id(&self) -> Option<ParticipantId> {
        if self.status != SessionStatus::Active {
            return None;
        }
        self.initiative_order().get(self.current_turn_index).copied()
    }

    /// Whose turn it is, derived from the live order
    pub fn current_participant(&self) -> CombatResult<&CombatParticipant> {
        self.require_status(SessionStatus::Active)?;
        let id = self.current_id().ok_or_else(|| {
            CombatError::illegal_state("turn index is past the end of the initiative order")
        })?;
        self.participant(id)
    }

    fn begin_turn(&mut self) {
        let Some(id) = self.current_id() else {
            return;
        };
        if let Some(p) = self.participants.get_mut(&id) {
            p.reset_turn();
            p.reset_legendary_actions();
            let name = p.name().to_string();
            self.record(
                ActionBuilder::new(ActionType::TurnStart)
                    .actor(id, &name)
                    .description(format!(
                        "Round {}: {}'s turn",
                        self.current_round, name
                    )),
            );
        }
    }

    // ---- lifecycle ----

    /// `preparing -> active`; rolls any missing initiative
    pub fn start(&mut self) -> CombatResult<()> {
        self.require_status(SessionStatus::Preparing)?;
        if !self.participants.values().any(|p| p.is_active) {
            return Err(CombatError::illegal_state("no active participants"));
        }
        self.roll_initiative()?;
        self.status = SessionStatus::Active;
        self.current_round = 1;
        self.current_turn_index = 0;
        self.started_at = Some(Utc::now());
        info!(
            "Combat session {} ({}) started with {} participants",
            self.id,
            self.name,
            self.participants.len()
        );
        self.record(
            ActionBuilder::new(ActionType::CombatStart)
                .description(format!("{} begins", self.name)),
        );
        self.begin_turn();
        Ok(())
    }

    /// Advance to the next participant, wrapping into a new round
    pub fn next_turn(&mut self) -> CombatResult<&CombatParticipant> {
        self.require_status(SessionStatus::Active)?;
        let count = self.initiative_order().len();
        if count == 0 {
            return Err(CombatError::illegal_state("no active participants"));
        }
        self.current_turn_index += 1;
        if self.current_turn_index >= count {
            self.current_round += 1;
            self.current_turn_index = 0;
            let round = self.current_round;
            for p in self.participants.values_mut() {
                for expired in p.conditions.expire(round) {
                    debug!("{} is no longer {}", p.id, expired.condition);
                }
            }
        }
        self.begin_turn();
        self.current_participant()
    }

    /// `-> ended`; builds and keeps the report
    pub fn end(&mut self) -> CombatResult<CombatReport> {
        self.require_not_ended()?;
        self.status = SessionStatus::Ended;
        self.ended_at = Some(Utc::now());
        self.record(
            ActionBuilder::new(ActionType::CombatEnd)
                .description(format!("{} ends after {} rounds", self.name, self.current_round)),
        );
        let report = self.build_report();
        info!(
            "Combat session {} ended: {} rounds, {} actions",
            self.id, report.total_rounds, report.total_actions
        );
        self.report = Some(report.clone());
        Ok(report)
    }

    fn build_report(&self) -> CombatReport {
        build_report(self.id, &self.name, &self.actions, self.participants.values())
    }

    /// The final report once ended, otherwise statistics so far
    pub fn report(&self) -> CombatReport {
        self.report.clone().unwrap_or_else(|| self.build_report())
    }

    // ---- attacks ----

    fn attack_modifiers(
        &self,
        attacker: &CombatParticipant,
        target: &CombatParticipant,
        ranged: bool,
        request: &AttackRequest,
    ) -> ModifierStack {
        let mut stack = ModifierStack::new();
        if request.advantage {
            stack.push("advantage", RollModifier::Advantage);
        }
        if request.disadvantage {
            stack.push("disadvantage", RollModifier::Disadvantage);
        }
        for m in &request.modifiers {
            stack.push("external", *m);
        }

        if attacker.attacks_with_disadvantage() {
            stack.push(format!("{} impaired", attacker.name()), RollModifier::Disadvantage);
        }
        let attacker_conditions = attacker.conditions.active();
        if attacker_conditions.iter().any(|c| c.effects().attack_advantage) {
            stack.push(format!("{} unseen", attacker.name()), RollModifier::Advantage);
        }

        let target_conditions = target.conditions.active();
        if conditions::has_attack_advantage_against(&target_conditions) {
            stack.push(format!("{} vulnerable", target.name()), RollModifier::Advantage);
        }
        for c in &target_conditions {
            let effects = c.effects();
            if effects.attacks_against_disadvantage {
                stack.push(format!("target {}", c), RollModifier::Disadvantage);
            }
            if !ranged && effects.melee_against_advantage {
                stack.push(format!("target {}", c), RollModifier::Advantage);
            }
            if ranged && effects.ranged_against_disadvantage {
                stack.push(format!("target {}", c), RollModifier::Disadvantage);
            }
        }

        stack.push_opt(
            target.environment.lighting.to_string(),
            lighting_modifier(target.environment.lighting, attacker.stat_block.has_darkvision()),
        );
        if ranged {
            let weather = self.environment.weather();
            stack.push_opt(weather.to_string(), weather_modifier(weather));
        }
        stack
    }

    /// Resolve one attack roll against a target. Budget checks are the caller's.
    fn strike(
        &mut self,
        attacker_id: ParticipantId,
        target_id: ParticipantId,
        request: &AttackRequest,
        action_type: ActionType,
        label: Option<&str>,
    ) -> CombatResult<AttackOutcome> {
        if attacker_id == target_id {
            return Err(CombatError::validation("a creature cannot attack itself"));
        }
        let attacker = self.participant(attacker_id)?.clone();
        let target = self.participant(target_id)?.clone();
        if target.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", target.name())));
        }
        let target_ac = target.effective_ac().ok_or_else(|| {
            CombatError::illegal_state(format!("{} is behind full cover", target.name()))
        })?;
        let attack = choose_attack(&attacker, request.attack.as_deref())?;
        let stack = self.attack_modifiers(&attacker, &target, attack.ranged, request);
        let auto_crit = !attack.ranged && target.conditions.melee_auto_crit();

        let roll = resolve::attack_roll(
            self.roller.as_mut(),
            attack.attack_bonus,
            target_ac,
            &stack,
            auto_crit,
        );
        let mut builder = ActionBuilder::new(action_type)
            .actor(attacker_id, attacker.name())
            .target(target_id, target.name())
            .name(label.unwrap_or(attack.name.as_str()))
            .roll(roll.d20.natural, roll.modifier, roll.total)
            .hit(roll.hit, roll.critical);

        let mut damage = None;
        let mut taken = None;
        if roll.hit {
            let rolled =
                resolve::roll_damage(self.roller.as_mut(), &attack.damage, attack.damage_type, roll.critical);
            let result = resolve::apply_resistance(
                &target.damage_profile,
                rolled.total,
                rolled.damage_type,
                roll.critical,
            );
            taken = Some(self.apply_damage(target_id, result.final_damage, roll.critical)?);
            builder = builder
                .damage(result.final_damage, Some(result.damage_type))
                .description(format!(
                    "{} {} {} with {} ({} vs AC {}) for {} {} damage",
                    attacker.name(),
                    if roll.critical { "crits" } else { "hits" },
                    target.name(),
                    attack.name,
                    roll.total,
                    target_ac,
                    result.final_damage,
                    result.damage_type
                ));
            damage = Some(result);
        } else {
            builder = builder.description(format!(
                "{} misses {} with {} ({} vs AC {})",
                attacker.name(),
                target.name(),
                attack.name,
                roll.total,
                target_ac
            ));
        }
        if !stack.entries().is_empty() {
            debug!("Attack modifiers: {}", stack.describe());
        }

        let action = self.record(builder);
        let concentration = self.concentration_check(target_id, taken)?;
        Ok(AttackOutcome {
            action,
            attack: attack.name,
            roll,
            damage,
            target_hp: self.participant(target_id)?.current_hp,
            target_dropped: taken.is_some_and(|t| t.dropped || t.died),
            concentration,
        })
    }

    /// Weapon attack on the attacker's turn; uses their action
    pub fn attack(
        &mut self,
        attacker: ParticipantId,
        target: ParticipantId,
        request: &AttackRequest,
    ) -> CombatResult<AttackOutcome> {
        self.require_status(SessionStatus::Active)?;
        self.require_turn(attacker)?;
        self.require_action(attacker)?;
        let outcome = self.strike(attacker, target, request, ActionType::Attack, None)?;
        self.participant_mut(attacker)?.use_action()?;
        Ok(outcome)
    }

    // ---- spells ----

    /// Caster knows the spell and (for enemies) has a use left
    fn check_spell_available(&mut self, caster: ParticipantId, spell: &str) -> CombatResult<()> {
        let p = self.participant_mut(caster)?;
        if !p.stat_block.knows_spell(spell) {
            return Err(CombatError::validation(format!(
                "{} does not know {}",
                p.name(),
                spell
            )));
        }
        if p.is_enemy() && !p.can_cast_enemy_spell(spell) {
            return Err(CombatError::illegal_state(format!(
                "{} has no uses of {} left",
                p.name(),
                spell
            )));
        }
        Ok(())
    }

    /// Spend the action and spell use; start concentration if needed
    fn spend_spell(
        &mut self,
        caster: ParticipantId,
        spell: &str,
        concentration: bool,
    ) -> CombatResult<Option<String>> {
        let round = self.current_round;
        let is_enemy = {
            let p = self.participant_mut(caster)?;
            p.use_action()?;
            p.is_enemy()
        };
        if is_enemy {
            self.participant_mut(caster)?.use_enemy_spell(spell)?;
        }
        if !concentration {
            return Ok(None);
        }
        let dropped = self.end_concentration(caster);
        self.participant_mut(caster)?.start_concentration(spell, round);
        Ok(dropped)
    }

    /// Attach the condition a spell imposes, if it imposes one
    pub fn auto_apply_condition_from_spell(
        &mut self,
        target: ParticipantId,
        spell: &str,
        caster: Option<ParticipantId>,
    ) -> CombatResult<Option<ConditionApplication>> {
        self.require_not_ended()?;
        let Some(imposed) = conditions::spell_condition(spell) else {
            return Ok(None);
        };
        let application = self.attach_condition(
            target,
            imposed.condition,
            imposed.duration,
            Provenance::new(spell, caster.map(|c| c.0)),
        )?;
        Ok(Some(application))
    }

    /// Cast a single-target or self spell on the caster's turn
    pub fn cast_spell(
        &mut self,
        caster_id: ParticipantId,
        request: &SpellRequest,
    ) -> CombatResult<SpellOutcome> {
        self.require_status(SessionStatus::Active)?;
        self.require_turn(caster_id)?;
        self.require_action(caster_id)?;
        let spell = request.spell.trim();
        if spell.is_empty() {
            return Err(CombatError::validation("spell name is empty"));
        }
        let damage_dice: Option<DamageDice> = request
            .damage
            .as_deref()
            .map(parse_damage)
            .transpose()?;
        let imposed = conditions::spell_condition(spell);
        let save_ability = request.save.or(imposed.and_then(|c| c.save));
        let needs_target = damage_dice.is_some() || request.attack_roll || save_ability.is_some();
        let target_id = match request.target {
            Some(t) => t,
            None if needs_target => {
                return Err(CombatError::validation(format!("{} needs a target", spell)))
            }
            None => caster_id,
        };
        let target = self.participant(target_id)?.clone();
        if target.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", target.name())));
        }
        let target_ac = if target_id == caster_id {
            target.armor_class
        } else {
            target.effective_ac().ok_or_else(|| {
                CombatError::illegal_state(format!("{} is behind full cover", target.name()))
            })?
        };
        self.check_spell_available(caster_id, spell)?;

        // validated; mutate from here on
        let caster = self.participant(caster_id)?.clone();
        let wants_concentration = request.concentration
            || imposed.is_some_and(|c| c.duration == ConditionDuration::Concentration);
        let dropped_concentration = self.spend_spell(caster_id, spell, wants_concentration)?;

        let mut builder = ActionBuilder::new(ActionType::Spell)
            .actor(caster_id, caster.name())
            .name(spell);
        if target_id != caster_id {
            builder = builder.target(target_id, target.name());
        }

        let mut attack = None;
        let mut save = None;
        let mut affected = true;
        let mut half = false;
        let mut critical = false;
        if request.attack_roll {
            let stack = self.attack_modifiers(&caster, &target, true, &AttackRequest::default());
            let roll = resolve::attack_roll(
                self.roller.as_mut(),
                caster.stat_block.spell_attack_bonus(),
                target_ac,
                &stack,
                false,
            );
            builder = builder
                .roll(roll.d20.natural, roll.modifier, roll.total)
                .hit(roll.hit, roll.critical);
            affected = roll.hit;
            critical = roll.critical;
            attack = Some(roll);
        } else if let Some(ability) = save_ability {
            let dc = caster.stat_block.spell_save_dc();
            let (stack, auto_fail) = save_modifiers(&target, ability, false, false, &[]);
            let roll = resolve::saving_throw(
                self.roller.as_mut(),
                target.stat_block.save_bonus(ability),
                dc,
                &stack,
                auto_fail,
            );
            builder = builder.save(ability, dc, save_total(&roll), roll.success);
            affected = !roll.success;
            half = roll.success && request.half_on_save.unwrap_or(true);
            save = Some(roll);
        }

        let mut damage = None;
        let mut taken = None;
        if let Some(dice) = &damage_dice {
            if affected || half {
                let rolled =
                    resolve::roll_damage(self.roller.as_mut(), dice, DamageType::Force, critical);
                let amount = resolve::aoe_damage(rolled.total, !affected, half);
                let result = resolve::apply_resistance(
                    &target.damage_profile,
                    amount,
                    rolled.damage_type,
                    critical,
                );
                taken = Some(self.apply_damage(target_id, result.final_damage, critical)?);
                builder = builder.damage(result.final_damage, Some(result.damage_type));
                damage = Some(result);
            }
        }

        let mut condition = None;
        if affected && !taken.is_some_and(|t| t.died) {
            condition = self.auto_apply_condition_from_spell(target_id, spell, Some(caster_id))?;
        }

        let mut description = format!("{} casts {}", caster.name(), spell);
        if target_id != caster_id {
            description.push_str(&format!(" on {}", target.name()));
        }
        if let Some(a) = &attack {
            description.push_str(if a.hit { " and hits" } else { " and misses" });
        }
        if let Some(s) = &save {
            description.push_str(if s.success { " (saved)" } else { " (failed save)" });
        }
        if let Some(d) = &damage {
            description.push_str(&format!(" for {} {} damage", d.final_damage, d.damage_type));
        }
        if let Some(c) = &condition {
            description.push_str(&format!(", now {}", c.condition));
        }
        let action = self.record(builder.description(description));
        let concentration = self.concentration_check(target_id, taken)?;

        Ok(SpellOutcome {
            action,
            attack,
            save,
            damage,
            condition,
            dropped_concentration,
            concentration,
        })
    }

    /// Cast an area spell: select targets geometrically, then save each
    pub fn cast_aoe_spell(
        &mut self,
        caster_id: ParticipantId,
        request: &AoeRequest,
    ) -> CombatResult<AoeOutcome> {
        self.require_status(SessionStatus::Active)?;
        self.require_turn(caster_id)?;
        self.require_action(caster_id)?;
        let spell = request.spell.trim();
        let template = aoe_spell(spell);
        let caster = self.participant(caster_id)?.clone();

        let shape = match (request.shape, template) {
            (Some(shape), _) => shape,
            (None, Some(t)) => t.shape_at(caster.position.point(), request.target),
            (None, None) => {
                return Err(CombatError::validation(format!(
                    "{} is not a known area spell and no shape was given",
                    spell
                )))
            }
        };
        let damage_dice = match (&request.damage, template.and_then(|t| t.damage)) {
            (Some(d), _) => Some(parse_damage(d)?),
            (None, Some(d)) => Some(parse_damage(d)?),
            (None, None) => None,
        };
        let ability = request
            .save
            .or(template.map(|t| t.save))
            .ok_or_else(|| CombatError::validation(format!("{} needs a save ability", spell)))?;
        let dc = request.dc.unwrap_or_else(|| caster.stat_block.spell_save_dc());
        let half_on_save = request
            .half_on_save
            .unwrap_or(template.map(|t| t.half_on_save).unwrap_or(true));
        self.check_spell_available(caster_id, spell)?;

        // Cones and lines start at the caster, who stands outside them
        let from_caster = matches!(shape, AoeShape::Cone { .. } | AoeShape::Line { .. });
        let candidates: Vec<AoeCandidate> = self
            .participants
            .values()
            .filter(|p| p.is_active && !(from_caster && p.id == caster_id))
            .map(|p| AoeCandidate {
                id: p.id.0,
                position: p.position.point(),
            })
            .collect();
        let hits = shape.select(&candidates);

        // validated; mutate from here on
        let imposed = conditions::spell_condition(spell);
        let concentration = imposed.is_some_and(|c| c.duration == ConditionDuration::Concentration);
        self.spend_spell(caster_id, spell, concentration)?;

        let damage_roll = damage_dice.as_ref().map(|dice| {
            resolve::roll_damage(self.roller.as_mut(), dice, DamageType::Force, false)
        });
        let action = self.record(
            ActionBuilder::new(ActionType::AoeSpell)
                .actor(caster_id, caster.name())
                .name(spell)
                .description(format!(
                    "{} casts {} catching {} creature(s)",
                    caster.name(),
                    spell,
                    hits.len()
                )),
        );

        let mut targets = Vec::with_capacity(hits.len());
        for hit in hits {
            let target_id = ParticipantId(hit.id);
            let target = self.participant(target_id)?.clone();
            let (stack, auto_fail) = save_modifiers(&target, ability, false, false, &[]);
            let save = resolve::saving_throw(
                self.roller.as_mut(),
                target.stat_block.save_bonus(ability),
                dc,
                &stack,
                auto_fail,
            );
            let mut builder = ActionBuilder::new(ActionType::AreaEffect)
                .actor(caster_id, caster.name())
                .target(target_id, target.name())
                .name(spell)
                .save(ability, dc, save_total(&save), save.success);

            let mut damage = None;
            let mut taken = None;
            if let Some(rolled) = &damage_roll {
                let amount = resolve::aoe_damage(rolled.total, save.success, half_on_save);
                let result =
                    resolve::apply_resistance(&target.damage_profile, amount, rolled.damage_type, false);
                taken = Some(self.apply_damage(target_id, result.final_damage, false)?);
                builder = builder.damage(result.final_damage, Some(result.damage_type));
                damage = Some(result);
            }
            let mut condition = None;
            if !save.success && !taken.is_some_and(|t| t.died) {
                condition = self.auto_apply_condition_from_spell(target_id, spell, Some(caster_id))?;
            }
            let description = format!(
                "{} {} against {}{}",
                target.name(),
                if save.success { "saves" } else { "fails" },
                spell,
                damage
                    .as_ref()
                    .map(|d: &DamageResult| format!(", taking {} {} damage", d.final_damage, d.damage_type))
                    .unwrap_or_default()
            );
            let target_action = self.record(builder.description(description));
            let check = self.concentration_check(target_id, taken)?;
            targets.push(AoeTargetResult {
                participant: target_id,
                distance: hit.distance,
                save,
                damage,
                condition,
                action: target_action,
                concentration: check,
            });
        }

        Ok(AoeOutcome {
            action,
            damage_roll,
            targets,
        })
    }

    // ---- saves ----

    /// Standalone saving throw against a DC
    pub fn saving_throw(
        &mut self,
        id: ParticipantId,
        request: &SaveRequest,
    ) -> CombatResult<SaveOutcome> {
        self.require_status(SessionStatus::Active)?;
        let p = self.participant(id)?.clone();
        if p.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", p.name())));
        }
        let (stack, auto_fail) = save_modifiers(
            &p,
            request.ability,
            request.advantage,
            request.disadvantage,
            &request.modifiers,
        );
        let roll = resolve::saving_throw(
            self.roller.as_mut(),
            p.stat_block.save_bonus(request.ability),
            request.dc,
            &stack,
            auto_fail,
        );
        let mut builder = ActionBuilder::new(ActionType::SavingThrow)
            .actor(id, p.name())
            .save(request.ability, request.dc, save_total(&roll), roll.success)
            .description(format!(
                "{} {} a DC {} {} save ({})",
                p.name(),
                if roll.success { "makes" } else { "fails" },
                request.dc,
                request.ability,
                roll.total
            ));
        if let Some(source) = &request.source {
            builder = builder.name(source);
        }
        if let Some(d20) = &roll.d20 {
            builder = builder.roll(d20.natural, roll.modifier, roll.total);
        }
        let action = self.record(builder);
        Ok(SaveOutcome { action, roll })
    }

    /// Roll a death save for a dying participant; once per round
    pub fn death_save(&mut self, id: ParticipantId) -> CombatResult<DeathSaveResult> {
        self.require_status(SessionStatus::Active)?;
        let round = self.current_round;
        let p = self.participant(id)?;
        if !p.is_dying() {
            return Err(CombatError::illegal_state(format!(
                "{} is not making death saves",
                p.name()
            )));
        }
        if p.last_death_save_round == Some(round) {
            return Err(CombatError::illegal_state(format!(
                "{} already rolled a death save this round",
                p.name()
            )));
        }
        let roll = self.roller.d20();
        let p = self.participant_mut(id)?;
        let outcome = p.make_death_save(roll)?;
        p.last_death_save_round = Some(round);
        let name = p.name().to_string();

        let state = if outcome.is_dead {
            "dies"
        } else if outcome.revived {
            "regains 1 HP"
        } else if outcome.is_stable {
            "is stable"
        } else {
            "holds on"
        };
        let action = self.record(
            ActionBuilder::new(ActionType::DeathSave)
                .actor(id, &name)
                .roll(roll, 0, roll as i32)
                .hit(outcome.success, roll == 20)
                .description(format!(
                    "{} rolls {} on a death save ({}/{}) and {}",
                    name, roll, outcome.successes, outcome.failures, state
                )),
        );
        Ok(DeathSaveResult { action, outcome })
    }

    // ---- reactions and legendary actions ----

    /// Spend a reaction, optionally attacking
    pub fn use_reaction(
        &mut self,
        id: ParticipantId,
        request: &ReactionRequest,
    ) -> CombatResult<ReactionOutcome> {
        self.require_status(SessionStatus::Active)?;
        let p = self.participant(id)?;
        if !p.can_act() {
            return Err(CombatError::illegal_state(format!("{} cannot react", p.name())));
        }
        if p.budget.reaction_used {
            return Err(CombatError::illegal_state(format!(
                "{} already used their reaction this round",
                p.name()
            )));
        }
        let name = p.name().to_string();
        let label = if request.name.trim().is_empty() {
            "Reaction"
        } else {
            request.name.trim()
        };

        let (action, attack) = match request.target {
            Some(target) => {
                let attack_request = AttackRequest {
                    attack: request.attack.clone(),
                    ..AttackRequest::default()
                };
                let outcome =
                    self.strike(id, target, &attack_request, ActionType::Reaction, Some(label))?;
                (outcome.action.clone(), Some(outcome))
            }
            None => {
                let action = self.record(
                    ActionBuilder::new(ActionType::Reaction)
                        .actor(id, &name)
                        .name(label)
                        .description(format!("{} uses {}", name, label)),
                );
                (action, None)
            }
        };
        self.participant_mut(id)?.use_reaction()?;
        Ok(ReactionOutcome { action, attack })
    }

    /// Use a legendary action outside the creature's own turn
    pub fn use_legendary_action(
        &mut self,
        id: ParticipantId,
        request: &LegendaryRequest,
    ) -> CombatResult<LegendaryOutcome> {
        self.require_status(SessionStatus::Active)?;
        let p = self.participant(id)?;
        let definition = p
            .stat_block
            .as_enemy()
            .and_then(|e| e.legendary_action(&request.action))
            .cloned()
            .ok_or_else(|| {
                CombatError::not_found(format!(
                    "{} has no legendary action {}",
                    p.name(),
                    request.action
                ))
            })?;
        if self.current_id() == Some(id) {
            return Err(CombatError::illegal_state(
                "legendary actions are used on other creatures' turns",
            ));
        }
        if !p.can_act() {
            return Err(CombatError::illegal_state(format!("{} cannot act", p.name())));
        }
        if definition.cost > p.legendary_actions_remaining {
            return Err(CombatError::illegal_state(format!(
                "{} has {} legendary actions left, {} costs {}",
                p.name(),
                p.legendary_actions_remaining,
                definition.name,
                definition.cost
            )));
        }
        let name = p.name().to_string();

        let (action, attack) = match (&definition.attack, request.target) {
            (Some(attack_name), Some(target)) => {
                let attack_request = AttackRequest {
                    attack: Some(attack_name.clone()),
                    ..AttackRequest::default()
                };
                let outcome = self.strike(
                    id,
                    target,
                    &attack_request,
                    ActionType::Legendary,
                    Some(&definition.name),
                )?;
                (outcome.action.clone(), Some(outcome))
            }
            (Some(_), None) => {
                return Err(CombatError::validation(format!(
                    "{} needs a target",
                    definition.name
                )))
            }
            (None, _) => {
                let action = self.record(
                    ActionBuilder::new(ActionType::Legendary)
                        .actor(id, &name)
                        .name(&definition.name)
                        .description(format!("{} uses {}", name, definition.name)),
                );
                (action, None)
            }
        };
        let remaining = self.participant_mut(id)?.use_legendary_action(definition.cost)?;
        Ok(LegendaryOutcome {
            action,
            cost: definition.cost,
            remaining,
            attack,
        })
    }

    // ---- grappling ----

    /// Contested grapple: STR + proficiency vs the target's best of STR/DEX
    pub fn grapple(
        &mut self,
        attacker_id: ParticipantId,
        target_id: ParticipantId,
    ) -> CombatResult<GrappleOutcome> {
        self.require_status(SessionStatus::Active)?;
        self.require_turn(attacker_id)?;
        let attacker = self.require_action(attacker_id)?.clone();
        if attacker_id == target_id {
            return Err(CombatError::validation("a creature cannot grapple itself"));
        }
        let target = self.participant(target_id)?.clone();
        if !target.is_active {
            return Err(CombatError::illegal_state(format!(
                "{} is not in the fight",
                target.name()
            )));
        }
        if attacker.grappling.is_some() {
            return Err(CombatError::illegal_state(format!(
                "{} is already holding a grapple",
                attacker.name()
            )));
        }
        if target.grappled_by.is_some() {
            return Err(CombatError::illegal_state(format!(
                "{} is already grappled",
                target.name()
            )));
        }

        let attacker_bonus =
            attacker.stat_block.ability_modifier(Ability::Strength) + attacker.stat_block.proficiency_bonus();
        let defender_bonus = best_physical_modifier(&target);
        let (attacker_total, defender_total, success) =
            resolve::contest(self.roller.as_mut(), attacker_bonus, defender_bonus);

        self.participant_mut(attacker_id)?.use_action()?;
        if success {
            self.participant_mut(attacker_id)?.grappling = Some(target_id);
            self.participant_mut(target_id)?.grappled_by = Some(attacker_id);
            self.attach_condition(
                target_id,
                Condition::Grappled,
                ConditionDuration::Instant,
                Provenance::new(GRAPPLE_SOURCE, Some(attacker_id.0)),
            )?;
        }
        let action = self.record(
            ActionBuilder::new(ActionType::Grapple)
                .actor(attacker_id, attacker.name())
                .target(target_id, target.name())
                .name("Grapple")
                .hit(success, false)
                .description(format!(
                    "{} {} {} ({} vs {})",
                    attacker.name(),
                    if success { "grapples" } else { "fails to grapple" },
                    target.name(),
                    attacker_total,
                    defender_total
                )),
        );
        Ok(GrappleOutcome {
            action,
            success,
            attacker_total,
            defender_total,
        })
    }

    /// Contested escape: best of STR/DEX vs the grappler's STR + proficiency
    pub fn escape_grapple(&mut self, id: ParticipantId) -> CombatResult<GrappleOutcome> {
        self.require_status(SessionStatus::Active)?;
        self.require_turn(id)?;
        let p = self.require_action(id)?.clone();
        let grappler_id = p.grappled_by.ok_or_else(|| {
            CombatError::illegal_state(format!("{} is not grappled", p.name()))
        })?;
        let grappler = self.participant(grappler_id)?.clone();

        let escape_bonus = best_physical_modifier(&p);
        let hold_bonus =
            grappler.stat_block.ability_modifier(Ability::Strength) + grappler.stat_block.proficiency_bonus();
        let (escape_total, hold_total, success) =
            resolve::contest(self.roller.as_mut(), escape_bonus, hold_bonus);

        self.participant_mut(id)?.use_action()?;
        if success {
            self.release_grapples(id);
        }
        let action = self.record(
            ActionBuilder::new(ActionType::Escape)
                .actor(id, p.name())
                .target(grappler_id, grappler.name())
                .name("Escape")
                .hit(success, false)
                .description(format!(
                    "{} {} {}'s grapple ({} vs {})",
                    p.name(),
                    if success { "escapes" } else { "fails to escape" },
                    grappler.name(),
                    escape_total,
                    hold_total
                )),
        );
        Ok(GrappleOutcome {
            action,
            success,
            attacker_total: escape_total,
            defender_total: hold_total,
        })
    }

    // ---- positioning and environment ----

    /// Set or clear explicit cover for a participant
    pub fn set_cover(&mut self, id: ParticipantId, cover: Option<Cover>) -> CombatResult<&CombatParticipant> {
        self.require_not_ended()?;
        let p = self.participant_mut(id)?;
        p.cover_override = cover;
        Ok(p)
    }

    /// Move a participant.
    ///
    /// While preparing this just places them. During combat it costs
    /// distance times the terrain and weather multipliers out of the
    /// participant's speed, and hazards at the destination trigger.
    pub fn move_participant(&mut self, id: ParticipantId, to: Position) -> CombatResult<MoveOutcome> {
        self.require_not_ended()?;
        if !(to.x.is_finite() && to.y.is_finite() && to.z.is_finite()) {
            return Err(CombatError::validation("position must be finite"));
        }
        let p = self.participant(id)?.clone();
        let from = p.position;
        let destination = self.environment.state_at(to.x, to.y);
        let preparing = self.status == SessionStatus::Preparing;

        let mut cost = 0.0;
        if !preparing {
            self.require_turn(id)?;
            if !p.is_active {
                return Err(CombatError::illegal_state(format!("{} cannot move", p.name())));
            }
            if p.effective_speed() == 0 {
                return Err(CombatError::illegal_state(format!(
                    "{} has a speed of 0",
                    p.name()
                )));
            }
            let origin_terrain = p.environment.terrain;
            let terrain = if origin_terrain.movement_multiplier() > destination.terrain.movement_multiplier() {
                origin_terrain
            } else {
                destination.terrain
            };
            let multiplier = calculate_movement_cost(p.stat_block.speed(), terrain, destination.weather).multiplier;
            cost = from.distance(&to) * multiplier;
            if cost > p.movement_remaining() + f64::EPSILON {
                return Err(CombatError::illegal_state(format!(
                    "{} needs {:.1} ft of movement but has {:.1} ft left",
                    p.name(),
                    cost,
                    p.movement_remaining()
                )));
            }
        }
        let hazards: Vec<(Hazard, DamageDice)> = if preparing {
            Vec::new()
        } else {
            destination
                .hazards
                .iter()
                .filter(|h| !p.environment.hazards.contains(h))
                .map(|h| {
                    parse_damage(h.effect().damage)
                        .map(|d| (*h, d))
                        .map_err(|e| CombatError::computation(format!("hazard table: {}", e)))
                })
                .collect::<CombatResult<_>>()?
        };

        // validated; mutate from here on
        {
            let mover = self.participant_mut(id)?;
            if cost > 0.0 {
                mover.spend_movement(cost)?;
            }
            mover.position = to;
            mover.environment = destination.clone();
        }
        let movement_remaining = self.participant(id)?.movement_remaining();
        let action = self.record(
            ActionBuilder::new(ActionType::Move)
                .actor(id, p.name())
                .description(format!(
                    "{} moves from ({:.0}, {:.0}) to ({:.0}, {:.0}) for {:.1} ft",
                    p.name(),
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    cost
                )),
        );

        let mut outcomes = Vec::new();
        for (hazard, dice) in hazards {
            if self.participant(id)?.is_dead {
                break;
            }
            outcomes.push(self.trigger_hazard(id, hazard, &dice)?);
        }

        Ok(MoveOutcome {
            action,
            from,
            to,
            cost,
            movement_remaining,
            environment: self.participant(id)?.environment.clone(),
            hazards: outcomes,
        })
    }

    fn trigger_hazard(
        &mut self,
        id: ParticipantId,
        hazard: Hazard,
        dice: &DamageDice,
    ) -> CombatResult<HazardOutcome> {
        let effect = hazard.effect();
        let p = self.participant(id)?.clone();
        let (stack, auto_fail) = save_modifiers(&p, effect.save, false, false, &[]);
        let save = resolve::saving_throw(
            self.roller.as_mut(),
            p.stat_block.save_bonus(effect.save),
            effect.dc,
            &stack,
            auto_fail,
        );
        let rolled = resolve::roll_damage(self.roller.as_mut(), dice, effect.damage_type, false);
        let amount = resolve::aoe_damage(rolled.total, save.success, true);
        let damage = resolve::apply_resistance(&p.damage_profile, amount, effect.damage_type, false);
        let taken = self.apply_damage(id, damage.final_damage, false)?;

        let mut condition = None;
        if let Some(c) = effect.condition.filter(|_| !save.success && !taken.died) {
            condition = Some(self.attach_condition(
                id,
                c,
                ConditionDuration::Rounds(1),
                Provenance::new(&hazard.to_string(), None),
            )?);
        }
        let action = self.record(
            ActionBuilder::new(ActionType::Hazard)
                .target(id, p.name())
                .name(&hazard.to_string())
                .save(effect.save, effect.dc, save_total(&save), save.success)
                .damage(damage.final_damage, Some(damage.damage_type))
                .description(format!(
                    "{} {} against {} and takes {} {} damage",
                    p.name(),
                    if save.success { "saves" } else { "fails" },
                    hazard,
                    damage.final_damage,
                    damage.damage_type
                )),
        );
        let concentration = self.concentration_check(id, Some(taken))?;
        Ok(HazardOutcome {
            hazard,
            save,
            damage,
            condition,
            action,
            concentration,
        })
    }

    /// Place an environmental effect; returns its id
    pub fn add_environmental_effect(&mut self, effect: EnvironmentalEffect) -> CombatResult<u64> {
        self.require_not_ended()?;
        let id = self.environment.add(effect)?;
        self.refresh_environment();
        Ok(id)
    }

    pub fn remove_environmental_effect(&mut self, id: u64) -> CombatResult<EnvironmentalEffect> {
        self.require_not_ended()?;
        let removed = self.environment.remove(id)?;
        self.refresh_environment();
        Ok(removed)
    }

    pub fn environmental_effects(&self) -> &[EnvironmentalEffect] {
        self.environment.effects()
    }

    /// Environment in effect where a participant stands
    pub fn local_environment(&self, id: ParticipantId) -> CombatResult<&LocalEnvironment> {
        Ok(&self.participant(id)?.environment)
    }

    // ---- healing and conditions ----

    /// Heal by a fixed amount ("7") or a dice expression ("2d4+2")
    pub fn heal(
        &mut self,
        target_id: ParticipantId,
        amount: &str,
        healer: Option<ParticipantId>,
    ) -> CombatResult<HealOutcome> {
        self.require_status(SessionStatus::Active)?;
        let (dice, fixed) = match amount.trim().parse::<i32>() {
            Ok(n) if n < 0 => {
                return Err(CombatError::validation(format!("negative healing: {}", n)))
            }
            Ok(n) => (None, n),
            Err(_) => (Some(parse_dice(amount)?), 0),
        };
        let healer = match healer {
            Some(h) => Some((h, self.participant(h)?.name().to_string())),
            None => None,
        };
        let target = self.participant(target_id)?;
        if target.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", target.name())));
        }
        let name = target.name().to_string();

        let total = match dice {
            Some(d) => d.roll(self.roller.as_mut()).max(0),
            None => fixed,
        };
        let healed = self.participant_mut(target_id)?.heal(total)?;
        let current_hp = self.participant(target_id)?.current_hp;

        let mut builder = ActionBuilder::new(ActionType::Heal).target(target_id, &name);
        if let Some((h, healer_name)) = &healer {
            builder = builder.actor(*h, healer_name);
        }
        let action = self.record(builder.description(format!(
            "{} regains {} HP ({} now)",
            name, healed, current_hp
        )));
        Ok(HealOutcome {
            action,
            healed,
            current_hp,
        })
    }

    /// Attach a condition directly
    pub fn apply_condition(
        &mut self,
        target_id: ParticipantId,
        condition: Condition,
        duration: ConditionDuration,
        provenance: Provenance,
    ) -> CombatResult<ConditionApplication> {
        self.require_not_ended()?;
        let target = self.participant(target_id)?;
        if target.is_dead {
            return Err(CombatError::illegal_state(format!("{} is dead", target.name())));
        }
        let name = target.name().to_string();
        let application = self.attach_condition(target_id, condition, duration, provenance)?;
        self.record(
            ActionBuilder::new(ActionType::Condition)
                .target(target_id, &name)
                .name(&condition.to_string())
                .description(format!("{} is {}", name, condition)),
        );
        Ok(application)
    }

    /// Remove a condition, from one source or from all of them
    pub fn remove_condition(
        &mut self,
        target_id: ParticipantId,
        condition: Condition,
        source: Option<&str>,
    ) -> CombatResult<Vec<ConditionApplication>> {
        self.require_not_ended()?;
        let p = self.participant_mut(target_id)?;
        let removed = p.conditions.remove(condition, source);
        if removed.is_empty() {
            return Err(CombatError::not_found(format!(
                "{} is not {}{}",
                p.name(),
                condition,
                source.map(|s| format!(" from {}", s)).unwrap_or_default()
            )));
        }
        if !p.conditions.has(condition) {
            match condition {
                Condition::Exhaustion => p.exhaustion = 0,
                Condition::Grappled => {
                    if let Some(g) = p.grappled_by.take() {
                        if let Some(grappler) = self.participants.get_mut(&g) {
                            grappler.grappling = None;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    // ---- automation ----

    /// Let the current participant act on its own.
    ///
    /// Picks the weakest standing opponent and the best attack, repeating
    /// for each attack a multiattack grants. Targets are re-picked after
    /// every attack.
    pub fn run_automated_turn(&mut self) -> CombatResult<Vec<CombatAction>> {
        self.require_status(SessionStatus::Active)?;
        let Some(id) = self.current_id() else {
            return Ok(Vec::new());
        };
        let p = self.participant(id)?;
        if !p.can_act() || p.budget.action_used {
            return Ok(Vec::new());
        }
        let side = p.side;
        let count = p
            .stat_block
            .as_enemy()
            .map(|e| ai::multiattack_count(&e.traits))
            .unwrap_or(1);

        let mut actions = Vec::new();
        for _ in 0..count {
            let candidates: Vec<(ParticipantId, i32)> = self
                .participants
                .values()
                .filter(|t| t.side != side && t.is_active && t.current_hp > 0 && t.effective_ac().is_some())
                .map(|t| (t.id, t.current_hp))
                .collect();
            let Some(target) = ai::select_target(&candidates, self.roller.as_mut()) else {
                break;
            };
            let outcome = self.strike(id, target, &AttackRequest::default(), ActionType::Attack, None)?;
            actions.push(outcome.action.clone());
            if let Some(check) = outcome.concentration {
                actions.push(check.action);
            }
        }
        // One action covers every attack of a multiattack
        if !actions.is_empty() {
            self.participant_mut(id)?.use_action()?;
        }
        Ok(actions)
    }

    /// Sides that still have someone standing
    fn sides_standing(&self) -> usize {
        [Side::Party, Side::Hostile]
            .into_iter()
            .filter(|side| {
                self.participants
                    .values()
                    .any(|p| p.is_active && p.side == *side)
            })
            .count()
    }

    /// Fight automatically until one side is left or the round limit hits
    pub fn run_battle(&mut self) -> CombatResult<CombatReport> {
        if self.status == SessionStatus::Preparing {
            self.start()?;
        }
        self.require_status(SessionStatus::Active)?;
        while self.sides_standing() > 1 && self.current_round <= self.rules.max_rounds {
            self.run_automated_turn()?;
            if self.sides_standing() <= 1 {
                break;
            }
            let round = self.current_round;
            self.next_turn()?;
            if self.current_round != round {
                let dying: Vec<ParticipantId> = self
                    .participants
                    .values()
                    .filter(|p| p.is_dying())
                    .map(|p| p.id)
                    .collect();
                for id in dying {
                    self.death_save(id)?;
                }
            }
        }
        self.end()
    }
}

/// Pick a named attack, or the best one, or an unarmed strike
fn choose_attack(p: &CombatParticipant, name: Option<&str>) -> CombatResult<AttackOption> {
    let attacks = p.stat_block.attacks();
    let unarmed = || {
        AttackOption::unarmed(
            p.stat_block.ability_modifier(Ability::Strength),
            p.stat_block.proficiency_bonus(),
        )
    };
    match name {
        Some(wanted) => {
            if let Some(a) = attacks.iter().find(|a| a.name.eq_ignore_ascii_case(wanted)) {
                return Ok(a.clone());
            }
            let fallback = unarmed();
            if fallback.name.eq_ignore_ascii_case(wanted) || wanted.eq_ignore_ascii_case("unarmed") {
                return Ok(fallback);
            }
            Err(CombatError::not_found(format!("{} has no attack {}", p.name(), wanted)))
        }
        None => Ok(ai::select_attack(&attacks).cloned().unwrap_or_else(unarmed)),
    }
}

/// Modifiers on a saving throw, plus whether it fails automatically
fn save_modifiers(
    p: &CombatParticipant,
    ability: Ability,
    advantage: bool,
    disadvantage: bool,
    extra: &[RollModifier],
) -> (ModifierStack, bool) {
    let mut stack = ModifierStack::new();
    if advantage {
        stack.push("advantage", RollModifier::Advantage);
    }
    if disadvantage {
        stack.push("disadvantage", RollModifier::Disadvantage);
    }
    for m in extra {
        stack.push("external", *m);
    }
    if ability == Ability::Dexterity {
        // Full cover shields at least as well as three-quarters
        let dex_bonus = match p.cover().effect() {
            CoverEffect::Bonus { dex_save, .. } => dex_save,
            CoverEffect::Untargetable => match Cover::ThreeQuarters.effect() {
                CoverEffect::Bonus { dex_save, .. } => dex_save,
                CoverEffect::Untargetable => 0,
            },
        };
        if dex_bonus != 0 {
            stack.push(format!("{} cover", p.cover()), RollModifier::Bonus(dex_bonus));
        }
    }
    if p.conditions.save_disadvantage(ability) {
        stack.push("restrained", RollModifier::Disadvantage);
    }
    (stack, p.conditions.auto_fails_save(ability))
}

fn save_total(save: &SaveRoll) -> Option<i32> {
    (!save.auto_failed).then_some(save.total)
}

fn best_physical_modifier(p: &CombatParticipant) -> i32 {
    p.stat_block
        .ability_modifier(Ability::Strength)
        .max(p.stat_block.ability_modifier(Ability::Dexterity))
}
