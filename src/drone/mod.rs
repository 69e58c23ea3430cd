//! Drone behaviour.
//!
//! A drone is a set of components in the AI registry. Each tick the think
//! step reads perception, runs the top state of the [`StateStack`] and
//! applies the resulting [`Decision`]. Top-state changes run the leave and
//! enter hooks in [`on_transition`].

pub mod attack;
mod battle;
mod idle;
mod search;
pub mod state;
mod suspect;

use glam::Vec2;

pub use attack::{AttackEffect, AttackKind, AttackOutput, AttackStrategy, LeadEstimator};
pub use state::{
    BattleState, Decision, IdleState, PuppetState, ResourcePhase, SearchState, State, StateKind,
    StateStack, SuspectPriority, SuspectState, Transition,
};

use crate::config::{AiConfig, DroneParams};
use crate::constants::{SUSPECT_HELP_CALL_CONFIDENCE, SUSPECT_HIGH_PRIORITY_CONFIDENCE};
use crate::events::{AiEvent, EventQueue};
use crate::level::LevelMap;
use crate::movement::{MoveInput, MoveStatus, MovementController, SpeedClass};
use crate::pathfinding::{EvadeZone, PathService};
use crate::perception::{Perception, TargetReading};
use crate::physics::{BodyState, EntityId, Physics};
use crate::squad::{SquadArena, SquadId, SquadLink};

/// What the drone wants to look at this tick (a world point)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Intent {
    pub look_at: Option<Vec2>,
}

/// Work that touches other drones, applied right after the issuing drone thinks
#[derive(Clone, Debug, PartialEq)]
pub enum AiCommand {
    HelpCall {
        caller: Option<EntityId>,
        origin: Vec2,
        target: Option<EntityId>,
    },
    InitSearch {
        agent: EntityId,
        squad: Option<SquadId>,
        center: Vec2,
    },
    ProxyInspect {
        position: Vec2,
    },
}

/// Shared world state for one think step
pub struct ThinkContext<'a> {
    pub physics: &'a dyn Physics,
    pub level: &'a LevelMap,
    pub paths: &'a mut PathService,
    pub squads: &'a mut SquadArena,
    pub config: &'a AiConfig,
    pub events: &'a mut EventQueue,
    pub commands: &'a mut Vec<AiCommand>,
    pub time: f32,
    pub dt: f32,
}

/// A drone's components, minus the state stack
pub struct DroneParts<'a> {
    pub id: EntityId,
    pub body: BodyState,
    pub params: &'a DroneParams,
    pub perception: &'a mut Perception,
    pub movement: Option<&'a mut MovementController>,
    pub attack: &'a mut AttackStrategy,
    pub squad: &'a mut SquadLink,
    pub intent: &'a mut Intent,
}

impl DroneParts<'_> {
    #[inline]
    pub fn is_mobile(&self) -> bool {
        self.movement.is_some()
    }

    /// The last path request for the current goal failed. Check before
    /// `move_to`, which retries a failed goal once the retry delay runs out.
    pub fn movement_failed(&self) -> bool {
        self.movement.as_deref().map_or(false, |m| m.has_failed())
    }

    /// Set a movement goal. `None` for drones that can't move.
    pub fn move_to(
        &mut self,
        ctx: &mut ThinkContext,
        goal: Vec2,
        speed: SpeedClass,
        evade: Option<EvadeZone>,
    ) -> Option<MoveStatus> {
        let movement = self.movement.as_deref_mut()?;
        let input = MoveInput {
            physics: ctx.physics,
            level: ctx.level,
            agent: self.id,
            body: &self.body,
            params: self.params,
        };
        Some(movement.set_target(&input, ctx.paths, goal, speed, evade))
    }

    pub fn stop(&mut self, ctx: &mut ThinkContext) {
        if let Some(movement) = self.movement.as_deref_mut() {
            movement.stop(ctx.paths);
        }
    }

    pub fn emit_attack(&self, outputs: Vec<AttackOutput>, events: &mut EventQueue) {
        emit_attack(self.id, outputs, events);
    }

    fn hooked(&mut self) -> HookParts<'_> {
        HookParts {
            id: self.id,
            perception: &mut *self.perception,
            movement: self.movement.as_deref_mut(),
            attack: &mut *self.attack,
            squad: &mut *self.squad,
        }
    }
}

/// Run one think step for a drone.
pub fn think(stack: &mut StateStack, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Option<Transition> {
    parts.intent.look_at = None;
    let decision = match stack.top_mut() {
        State::Idle(state) => idle::think(state, parts, ctx),
        State::Suspect(state) => suspect::think(state, parts, ctx),
        State::Battle(state) => battle::think(state, parts, ctx),
        State::Search(state) => search::think(state, parts, ctx),
        State::Puppet(state) => puppet(state, parts, ctx),
    };
    let transition = stack.apply(decision);
    if let Some(transition) = transition {
        let mut shared = Shared {
            paths: &mut *ctx.paths,
            squads: &mut *ctx.squads,
            events: &mut *ctx.events,
        };
        on_transition(transition, stack, parts.hooked(), &mut shared);
    }
    transition
}

/// Components touched by the leave/enter hooks
pub struct HookParts<'a> {
    pub id: EntityId,
    pub perception: &'a mut Perception,
    pub movement: Option<&'a mut MovementController>,
    pub attack: &'a mut AttackStrategy,
    pub squad: &'a mut SquadLink,
}

/// World services the hooks write to
pub struct Shared<'a> {
    pub paths: &'a mut PathService,
    pub squads: &'a mut SquadArena,
    pub events: &'a mut EventQueue,
}

/// Leave/enter hooks for a change of the top state.
pub fn on_transition(transition: Transition, stack: &StateStack, parts: HookParts, shared: &mut Shared) {
    if let Some(movement) = parts.movement {
        movement.stop(shared.paths);
    }
    if transition.from == StateKind::Battle {
        let mut outputs = Vec::new();
        parts.attack.reset(&mut outputs);
        emit_attack(parts.id, outputs, shared.events);
    }

    parts.perception.fov_ramp = match stack.top() {
        State::Battle(_) => 1.0,
        State::Suspect(state) => state.confidence.clamp(0.0, 1.0),
        State::Search(state) => state.suspicion.clamp(0.0, 1.0),
        State::Idle(_) | State::Puppet(_) => 0.0,
    };
    if transition.to == StateKind::Idle {
        parts.perception.forget();
        if let Some(squad) = shared.squads.leave(parts.id, parts.squad) {
            shared.events.push(AiEvent::SquadDisbanded { squad });
        }
    }

    tracing::debug!("{:?}: {:?} -> {:?}", parts.id, transition.from, transition.to);
    shared.events.push(AiEvent::StateChanged {
        agent: parts.id,
        from: transition.from,
        to: transition.to,
    });
}

/// Turn attack outputs into host events.
pub fn emit_attack(agent: EntityId, outputs: Vec<AttackOutput>, events: &mut EventQueue) {
    for output in outputs {
        events.push(match output {
            AttackOutput::Fire { aim } => AiEvent::Fire { shooter: agent, aim },
            AttackOutput::EffectStarted(effect) => AiEvent::EffectStarted { agent, effect },
            AttackOutput::EffectStopped(effect) => AiEvent::EffectStopped { agent, effect },
        });
    }
}

/// Enter battle against `target`, joining (or forming) its squad.
pub(crate) fn engage(
    parts: &mut DroneParts,
    ctx: &mut ThinkContext,
    target: Option<EntityId>,
    seen: Option<(Vec2, Vec2)>,
    last_known: Option<Vec2>,
) -> State {
    if let Some(target) = target {
        let enlisted = ctx.squads.enlist(parts.id, parts.squad, target);
        if enlisted.formed {
            ctx.events.push(AiEvent::SquadFormed {
                squad: enlisted.squad,
                target: Some(target),
            });
        }
        if let Some(squad) = enlisted.disbanded {
            ctx.events.push(AiEvent::SquadDisbanded { squad });
        }
        if let Some((position, velocity)) = seen {
            ctx.squads
                .report_seen(enlisted.squad, position, velocity, ctx.time);
        }
    }
    let mut battle = BattleState::new(target, ctx.time);
    battle.last_known = seen.map(|(position, _)| position).or(last_known);
    State::Battle(battle)
}

/// Visible target position and velocity, if the reading is a sighting.
pub(crate) fn sighting(reading: TargetReading, physics: &dyn Physics) -> Option<(EntityId, Vec2, Vec2)> {
    match reading {
        TargetReading::Visible {
            entity, position, ..
        } => {
            let velocity = physics.body(entity).map_or(Vec2::ZERO, |b| b.velocity);
            Some((entity, position, velocity))
        }
        _ => None,
    }
}

/// State to enter after taking damage this tick, if any.
pub(crate) fn react_to_damage(parts: &mut DroneParts, ctx: &mut ThinkContext) -> Option<State> {
    let damage = parts.perception.damage()?;
    let source_body = damage.source.and_then(|s| ctx.physics.body(s));
    let source_position = source_body.map(|b| b.position).or(damage.source_position);
    let seen = sighting(parts.perception.reading(), ctx.physics)
        .filter(|(entity, _, _)| Some(*entity) == damage.source)
        .map(|(_, position, velocity)| (position, velocity));

    if !parts.is_mobile() {
        let origin = source_position.unwrap_or(parts.body.position);
        return Some(call_for_help(parts, ctx, origin, damage.source));
    }

    match damage.source {
        Some(source) if source_body.is_some() => {
            Some(engage(parts, ctx, Some(source), seen, source_position))
        }
        _ => {
            let origin = source_position.unwrap_or(parts.body.position);
            Some(State::Suspect(SuspectState::new(
                origin,
                SUSPECT_HELP_CALL_CONFIDENCE,
                SuspectPriority::Normal,
            )))
        }
    }
}

/// A drone that can't move asks nearby drones to engage for it and keeps
/// watching `origin` at high confidence.
pub(crate) fn call_for_help(
    parts: &mut DroneParts,
    ctx: &mut ThinkContext,
    origin: Vec2,
    target: Option<EntityId>,
) -> State {
    ctx.commands.push(AiCommand::HelpCall {
        caller: Some(parts.id),
        origin,
        target,
    });
    let mut suspect = SuspectState::new(origin, SUSPECT_HIGH_PRIORITY_CONFIDENCE, SuspectPriority::Normal);
    suspect.target = target;
    State::Suspect(suspect)
}

fn puppet(state: &mut PuppetState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    if let Some(target) = state.target {
        if parts.move_to(ctx, target, state.speed, None) == Some(MoveStatus::Arrived) {
            state.target = None;
        }
    }
    parts.intent.look_at = state.facing;
    Decision::Stay
}
