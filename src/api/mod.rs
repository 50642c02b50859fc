//! Request/response contract
//!
//! Transport-neutral messages for every session operation. A request is a
//! JSON object tagged by `op`; the response is either `{"status": "ok",
//! "result": ...}` or `{"status": "error", "code": ..., "reason": ...}`.
//! [`CombatService`] dispatches requests onto a [`CombatManager`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::combat::{
    AoeOutcome, AoeRequest, AttackOutcome, AttackRequest, CombatAction, CombatError, CombatManager,
    CombatParticipant, CombatReport, CombatResult, Condition, ConditionApplication, ConditionDuration, Cover,
    DeathSaveResult, EnvironmentalEffect, GrappleOutcome, HealOutcome, LegendaryOutcome, LegendaryRequest,
    LocalEnvironment, MoveOutcome, ParticipantId, Position, Provenance, ReactionOutcome, ReactionRequest,
    SaveOutcome, SaveRequest, SessionSnapshot, SessionSummary, SpellOutcome, SpellRequest, StatBlock,
};

fn instant() -> ConditionDuration {
    ConditionDuration::Instant
}

/// One operation against the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CombatRequest {
    CreateSession {
        name: String,
    },
    ListSessions,
    RemoveSession {
        session: Uuid,
    },
    AddParticipant {
        session: Uuid,
        stat_block: StatBlock,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        initiative: Option<i32>,
    },
    RollInitiative {
        session: Uuid,
    },
    SetInitiative {
        session: Uuid,
        participant: ParticipantId,
        initiative: i32,
    },
    StartSession {
        session: Uuid,
    },
    NextTurn {
        session: Uuid,
    },
    GetState {
        session: Uuid,
    },
    GetActions {
        session: Uuid,
    },
    Attack {
        session: Uuid,
        attacker: ParticipantId,
        target: ParticipantId,
        #[serde(flatten)]
        request: AttackRequest,
    },
    CastSpell {
        session: Uuid,
        caster: ParticipantId,
        #[serde(flatten)]
        request: SpellRequest,
    },
    CastAoeSpell {
        session: Uuid,
        caster: ParticipantId,
        #[serde(flatten)]
        request: AoeRequest,
    },
    SavingThrow {
        session: Uuid,
        participant: ParticipantId,
        #[serde(flatten)]
        request: SaveRequest,
    },
    DeathSave {
        session: Uuid,
        participant: ParticipantId,
    },
    UseReaction {
        session: Uuid,
        participant: ParticipantId,
        #[serde(flatten)]
        request: ReactionRequest,
    },
    UseLegendaryAction {
        session: Uuid,
        participant: ParticipantId,
        #[serde(flatten)]
        request: LegendaryRequest,
    },
    Grapple {
        session: Uuid,
        attacker: ParticipantId,
        target: ParticipantId,
    },
    EscapeGrapple {
        session: Uuid,
        participant: ParticipantId,
    },
    SetCover {
        session: Uuid,
        participant: ParticipantId,
        #[serde(default)]
        cover: Option<Cover>,
    },
    Move {
        session: Uuid,
        participant: ParticipantId,
        position: Position,
    },
    AddEnvironmentalEffect {
        session: Uuid,
        effect: EnvironmentalEffect,
    },
    RemoveEnvironmentalEffect {
        session: Uuid,
        effect_id: u64,
    },
    ListEnvironmentalEffects {
        session: Uuid,
    },
    GetLocalEnvironment {
        session: Uuid,
        participant: ParticipantId,
    },
    Heal {
        session: Uuid,
        target: ParticipantId,
        /// Fixed number or dice expression
        amount: String,
        #[serde(default)]
        healer: Option<ParticipantId>,
    },
    ApplyCondition {
        session: Uuid,
        target: ParticipantId,
        condition: Condition,
        #[serde(default = "instant")]
        duration: ConditionDuration,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        source_participant: Option<ParticipantId>,
    },
    RemoveCondition {
        session: Uuid,
        target: ParticipantId,
        condition: Condition,
        #[serde(default)]
        source: Option<String>,
    },
    RunAutomatedTurn {
        session: Uuid,
    },
    EndSession {
        session: Uuid,
    },
    GetReport {
        session: Uuid,
    },
}

/// Payload of a successful response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResponseBody {
    SessionCreated(Uuid),
    Sessions(Vec<SessionSummary>),
    Removed,
    ParticipantAdded(ParticipantId),
    Initiative(Vec<(ParticipantId, i32)>),
    Participant(CombatParticipant),
    State(SessionSnapshot),
    Actions(Vec<CombatAction>),
    Attack(AttackOutcome),
    Spell(SpellOutcome),
    AoeSpell(AoeOutcome),
    Save(SaveOutcome),
    DeathSave(DeathSaveResult),
    Reaction(ReactionOutcome),
    Legendary(LegendaryOutcome),
    Grapple(GrappleOutcome),
    Move(MoveOutcome),
    EffectAdded(u64),
    EffectRemoved(EnvironmentalEffect),
    Effects(Vec<EnvironmentalEffect>),
    LocalEnvironment(LocalEnvironment),
    Heal(HealOutcome),
    ConditionApplied(ConditionApplication),
    ConditionsRemoved(Vec<ConditionApplication>),
    Report(CombatReport),
    Done,
}

/// Either a result or a structured error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CombatResponse {
    Ok { result: ResponseBody },
    Error { code: String, reason: String },
}

impl CombatResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, CombatResponse::Ok { .. })
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            CombatResponse::Error { code, .. } => Some(code),
            CombatResponse::Ok { .. } => None,
        }
    }
}

impl From<CombatError> for CombatResponse {
    fn from(err: CombatError) -> Self {
        CombatResponse::Error {
            code: err.code().to_string(),
            reason: err.reason().to_string(),
        }
    }
}

impl From<CombatResult<ResponseBody>> for CombatResponse {
    fn from(result: CombatResult<ResponseBody>) -> Self {
        match result {
            Ok(result) => CombatResponse::Ok { result },
            Err(e) => e.into(),
        }
    }
}

/// Dispatches requests onto sessions
#[derive(Clone)]
pub struct CombatService {
    manager: Arc<CombatManager>,
}

impl CombatService {
    pub fn new(manager: Arc<CombatManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<CombatManager> {
        &self.manager
    }

    pub async fn handle(&self, request: CombatRequest) -> CombatResponse {
        let result = self.dispatch(request).await;
        if let Err(e) = &result {
            debug!("Request rejected: {}", e);
        }
        result.into()
    }

    /// Parse one JSON request and handle it
    pub async fn handle_json(&self, text: &str) -> CombatResponse {
        match serde_json::from_str::<CombatRequest>(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => CombatError::validation(format!("malformed request: {}", e)).into(),
        }
    }

    async fn dispatch(&self, request: CombatRequest) -> CombatResult<ResponseBody> {
        use CombatRequest as R;
        let m = &self.manager;
        match request {
            R::CreateSession { name } => {
                if name.trim().is_empty() {
                    return Err(CombatError::validation("session name is empty"));
                }
                Ok(ResponseBody::SessionCreated(m.create_session(&name).await))
            }
            R::ListSessions => Ok(ResponseBody::Sessions(m.list().await)),
            R::RemoveSession { session } => m.remove(session).await.map(|_| ResponseBody::Removed),
            R::AddParticipant {
                session,
                stat_block,
                position,
                initiative,
            } => m
                .with_session(session, |s| s.add_participant(stat_block, position, initiative))
                .await
                .map(ResponseBody::ParticipantAdded),
            R::RollInitiative { session } => m
                .with_session(session, |s| s.roll_initiative())
                .await
                .map(ResponseBody::Initiative),
            R::SetInitiative {
                session,
                participant,
                initiative,
            } => m
                .with_session(session, |s| s.set_initiative(participant, initiative))
                .await
                .map(|_| ResponseBody::Done),
            R::StartSession { session } => m
                .with_session(session, |s| {
                    s.start()?;
                    Ok(s.snapshot())
                })
                .await
                .map(ResponseBody::State),
            R::NextTurn { session } => m
                .with_session(session, |s| s.next_turn().cloned())
                .await
                .map(ResponseBody::Participant),
            R::GetState { session } => m
                .with_session(session, |s| Ok(s.snapshot()))
                .await
                .map(ResponseBody::State),
            R::GetActions { session } => m
                .with_session(session, |s| Ok(s.actions().to_vec()))
                .await
                .map(ResponseBody::Actions),
            R::Attack {
                session,
                attacker,
                target,
                request,
            } => m
                .with_session(session, |s| s.attack(attacker, target, &request))
                .await
                .map(ResponseBody::Attack),
            R::CastSpell {
                session,
                caster,
                request,
            } => m
                .with_session(session, |s| s.cast_spell(caster, &request))
                .await
                .map(ResponseBody::Spell),
            R::CastAoeSpell {
                session,
                caster,
                request,
            } => m
                .with_session(session, |s| s.cast_aoe_spell(caster, &request))
                .await
                .map(ResponseBody::AoeSpell),
            R::SavingThrow {
                session,
                participant,
                request,
            } => m
                .with_session(session, |s| s.saving_throw(participant, &request))
                .await
                .map(ResponseBody::Save),
            R::DeathSave {
                session,
                participant,
            } => m
                .with_session(session, |s| s.death_save(participant))
                .await
                .map(ResponseBody::DeathSave),
            R::UseReaction {
                session,
                participant,
                request,
            } => m
                .with_session(session, |s| s.use_reaction(participant, &request))
                .await
                .map(ResponseBody::Reaction),
            R::UseLegendaryAction {
                session,
                participant,
                request,
            } => m
                .with_session(session, |s| s.use_legendary_action(participant, &request))
                .await
                .map(ResponseBody::Legendary),
            R::Grapple {
                session,
                attacker,
                target,
            } => m
                .with_session(session, |s| s.grapple(attacker, target))
                .await
                .map(ResponseBody::Grapple),
            R::EscapeGrapple {
                session,
                participant,
            } => m
                .with_session(session, |s| s.escape_grapple(participant))
                .await
                .map(ResponseBody::Grapple),
            R::SetCover {
                session,
                participant,
                cover,
            } => m
                .with_session(session, |s| s.set_cover(participant, cover).cloned())
                .await
                .map(ResponseBody::Participant),
            R::Move {
                session,
                participant,
                position,
            } => m
                .with_session(session, |s| s.move_participant(participant, position))
                .await
                .map(ResponseBody::Move),
            R::AddEnvironmentalEffect { session, effect } => m
                .with_session(session, |s| s.add_environmental_effect(effect))
                .await
                .map(ResponseBody::EffectAdded),
            R::RemoveEnvironmentalEffect { session, effect_id } => m
                .with_session(session, |s| s.remove_environmental_effect(effect_id))
                .await
                .map(ResponseBody::EffectRemoved),
            R::ListEnvironmentalEffects { session } => m
                .with_session(session, |s| Ok(s.environmental_effects().to_vec()))
                .await
                .map(ResponseBody::Effects),
            R::GetLocalEnvironment {
                session,
                participant,
            } => m
                .with_session(session, |s| s.local_environment(participant).cloned())
                .await
                .map(ResponseBody::LocalEnvironment),
            R::Heal {
                session,
                target,
                amount,
                healer,
            } => m
                .with_session(session, |s| s.heal(target, &amount, healer))
                .await
                .map(ResponseBody::Heal),
            R::ApplyCondition {
                session,
                target,
                condition,
                duration,
                source,
                source_participant,
            } => {
                let provenance = Provenance {
                    source,
                    source_participant: source_participant.map(|p| p.0),
                };
                m.with_session(session, |s| s.apply_condition(target, condition, duration, provenance))
                    .await
                    .map(ResponseBody::ConditionApplied)
            }
            R::RemoveCondition {
                session,
                target,
                condition,
                source,
            } => m
                .with_session(session, |s| s.remove_condition(target, condition, source.as_deref()))
                .await
                .map(ResponseBody::ConditionsRemoved),
            R::RunAutomatedTurn { session } => m
                .with_session(session, |s| s.run_automated_turn())
                .await
                .map(ResponseBody::Actions),
            R::EndSession { session } => m
                .with_session(session, |s| s.end())
                .await
                .map(ResponseBody::Report),
            R::GetReport { session } => m
                .with_session(session, |s| Ok(s.report()))
                .await
                .map(ResponseBody::Report),
        }
    }
}
