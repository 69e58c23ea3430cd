//! Idle behaviour: routines plus the alert checks that leave idle.

use crate::constants::{
    IDLE_PATROL_WAIT, RESOURCE_REST_TIME, RESOURCE_WORK_TIME, SUSPECT_INITIAL_LAST_KNOWN,
    SUSPECT_INITIAL_SIGHTING,
};
use crate::movement::{MoveStatus, SpeedClass};
use crate::perception::TargetReading;

use super::{
    call_for_help, engage, react_to_damage, sighting, Decision, DroneParts, IdleState,
    ResourcePhase, State, SuspectPriority, SuspectState, ThinkContext,
};

pub(super) fn think(idle: &mut IdleState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    if let Some(state) = react_to_damage(parts, ctx) {
        return Decision::Push(state);
    }
    if let Some(state) = react_to_reading(parts, ctx) {
        return Decision::Push(state);
    }
    routine(idle, parts, ctx);
    Decision::Stay
}

fn react_to_reading(parts: &mut DroneParts, ctx: &mut ThinkContext) -> Option<State> {
    let reading = parts.perception.reading();
    if let Some((entity, position, velocity)) = sighting(reading, ctx.physics) {
        let damaging = matches!(reading, TargetReading::Visible { damaging: true, .. });
        let window = ctx.config.squad.recent_sighting;
        let hunted = ctx
            .squads
            .find_by_target(entity)
            .and_then(|id| ctx.squads.get(id))
            .map_or(false, |squad| squad.has_recent_sighting(ctx.time, window));
        if damaging && !parts.is_mobile() {
            return Some(call_for_help(parts, ctx, position, Some(entity)));
        }
        if damaging || hunted {
            return Some(engage(parts, ctx, Some(entity), Some((position, velocity)), None));
        }
        let mut suspect = SuspectState::new(position, SUSPECT_INITIAL_SIGHTING, SuspectPriority::Normal);
        suspect.target = Some(entity);
        return Some(State::Suspect(suspect));
    }

    let position = match reading {
        TargetReading::LastKnown { position } => Some(position),
        _ => parts.perception.threat().map(|threat| threat.origin),
    }?;
    Some(State::Suspect(SuspectState::new(
        position,
        SUSPECT_INITIAL_LAST_KNOWN,
        SuspectPriority::Normal,
    )))
}

fn routine(idle: &mut IdleState, parts: &mut DroneParts, ctx: &mut ThinkContext) {
    if !parts.is_mobile() {
        return;
    }
    let dt = ctx.dt;
    match idle {
        IdleState::Point { home } => {
            parts.move_to(ctx, *home, SpeedClass::Walk, None);
        }
        IdleState::Patrol {
            waypoints,
            index,
            wait,
        } => {
            if waypoints.is_empty() {
                return;
            }
            if *wait > 0.0 {
                *wait -= dt;
                return;
            }
            if parts.movement_failed() {
                *index = (*index + 1) % waypoints.len();
            }
            let goal = waypoints[*index % waypoints.len()];
            if parts.move_to(ctx, goal, SpeedClass::Walk, None) == Some(MoveStatus::Arrived) {
                *index = (*index + 1) % waypoints.len();
                *wait = IDLE_PATROL_WAIT;
            }
        }
        IdleState::Resource {
            home,
            node,
            phase,
            timer,
        } => match phase {
            ResourcePhase::Going | ResourcePhase::Returning => {
                let (goal, next) = if *phase == ResourcePhase::Going {
                    (*node, ResourcePhase::Working)
                } else {
                    (*home, ResourcePhase::Resting)
                };
                if parts.move_to(ctx, goal, SpeedClass::Precise, None) == Some(MoveStatus::Arrived) {
                    *phase = next;
                    *timer = 0.0;
                }
            }
            ResourcePhase::Working | ResourcePhase::Resting => {
                *timer += dt;
                let (limit, next) = if *phase == ResourcePhase::Working {
                    (RESOURCE_WORK_TIME, ResourcePhase::Returning)
                } else {
                    (RESOURCE_REST_TIME, ResourcePhase::Going)
                };
                if *timer >= limit {
                    *phase = next;
                    *timer = 0.0;
                }
            }
        },
        IdleState::ChasePlayer { target } => {
            let Some(body) = ctx.physics.body(*target) else {
                return;
            };
            parts.intent.look_at = Some(body.position);
            // Chase the target's cell so a failed path is not retried every tick
            let goal = ctx.level.cell_center(ctx.level.cell_coord(body.position));
            parts.move_to(ctx, goal, SpeedClass::Run, None);
        }
    }
}
