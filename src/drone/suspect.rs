use crate::constants::{
    SUSPECT_CHASE_THRESHOLD, SUSPECT_DECAY, SUSPECT_FORGET, SUSPECT_GAIN_FAR, SUSPECT_GAIN_OPTIMAL,
};
use crate::movement::{MoveStatus, SpeedClass};
use crate::perception::TargetReading;

use super::{
    engage, react_to_damage, sighting, Decision, DroneParts, SuspectPriority, SuspectState,
    ThinkContext,
};

pub(super) fn think(suspect: &mut SuspectState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    // A drone that can't move has already called for help; it fights back
    // once the shooter is in sight
    if !parts.is_mobile() {
        let reading = parts.perception.reading();
        if let (TargetReading::Visible { damaging: true, .. }, Some((entity, position, velocity))) =
            (reading, sighting(reading, ctx.physics))
        {
            return Decision::Replace(engage(parts, ctx, Some(entity), Some((position, velocity)), None));
        }
    }
    if let Some(state) = react_to_damage(parts, ctx) {
        return Decision::Replace(state);
    }

    let dt = ctx.dt;
    // Help-calls hold their confidence until the reported spot is reached
    let answering = suspect.priority != SuspectPriority::Normal && !suspect.reached;
    let reading = parts.perception.reading();
    let seen = sighting(reading, ctx.physics);
    match reading {
        TargetReading::Visible {
            entity,
            position,
            distance,
            damaging,
        } => {
            if damaging {
                let velocity = seen.map_or(glam::Vec2::ZERO, |(_, _, v)| v);
                return Decision::Replace(engage(
                    parts,
                    ctx,
                    Some(entity),
                    Some((position, velocity)),
                    None,
                ));
            }
            let gain = if distance <= parts.params.optimal_detect_radius {
                SUSPECT_GAIN_OPTIMAL
            } else {
                SUSPECT_GAIN_FAR
            };
            suspect.confidence += gain * dt;
            suspect.position = position;
            suspect.target = Some(entity);
        }
        TargetReading::LastKnown { position } => {
            suspect.position = position;
            if !answering {
                suspect.confidence -= SUSPECT_DECAY * dt;
            }
        }
        TargetReading::None => {
            if !answering {
                suspect.confidence -= SUSPECT_DECAY * dt;
            }
        }
    }
    suspect.confidence = suspect.confidence.max(0.0);

    if suspect.confidence >= 1.0 {
        let seen = seen.map(|(_, position, velocity)| (position, velocity));
        return Decision::Replace(engage(parts, ctx, suspect.target, seen, Some(suspect.position)));
    }

    parts.perception.fov_ramp = suspect.confidence.min(1.0);
    parts.intent.look_at = Some(suspect.position);

    let wants_move = suspect.confidence >= SUSPECT_CHASE_THRESHOLD || answering;
    if wants_move && parts.is_mobile() {
        if parts.movement_failed() {
            suspect.reached = true;
            suspect.moving = false;
            parts.stop(ctx);
        } else {
            let speed = if answering {
                SpeedClass::Run
            } else {
                SpeedClass::Walk
            };
            match parts.move_to(ctx, suspect.position, speed, None) {
                Some(MoveStatus::Arrived) => {
                    suspect.reached = true;
                    suspect.moving = false;
                }
                _ => suspect.moving = true,
            }
        }
    } else if suspect.moving {
        parts.stop(ctx);
        suspect.moving = false;
    }

    if suspect.confidence <= SUSPECT_FORGET && !suspect.moving {
        return Decision::Pop;
    }
    Decision::Stay
}
