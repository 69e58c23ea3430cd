//! Battle: fight a visible target, chase a hidden one, hand off to search.

use glam::Vec2;

use crate::constants::{
    BATTLE_FIRST_SHOT_DELAY, BATTLE_LEAD_MAX, BATTLE_LEAD_RESET_TIME, BATTLE_LEAD_TIME,
    BATTLE_MAX_CHASE_FAILURES, BATTLE_RETREAT_DISTANCE, BATTLE_STANDOFF_TOLERANCE,
    CAMPER_GIVE_UP_TIME,
};
use crate::events::AiEvent;
use crate::geometry::unit;
use crate::movement::{MoveStatus, SpeedClass};
use crate::pathfinding::EvadeZone;
use crate::perception::TargetReading;
use crate::physics::{EntityId, RayFilter};

use super::{sighting, AiCommand, BattleState, Decision, DroneParts, ThinkContext};

pub(super) fn think(battle: &mut BattleState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    if let Some(damage) = parts.perception.damage() {
        battle.last_damage = Some(ctx.time);
        if battle.target.is_none() {
            battle.target = damage.source;
        }
        let source_position = damage
            .source
            .and_then(|s| ctx.physics.body(s))
            .map(|b| b.position)
            .or(damage.source_position);
        if battle.last_known.is_none() {
            battle.last_known = source_position;
        }
    }

    let reading = parts.perception.reading();
    match sighting(reading, ctx.physics) {
        Some((entity, position, velocity)) => {
            let distance = position.distance(parts.body.position);
            fight(battle, parts, ctx, entity, position, velocity, distance);
            Decision::Stay
        }
        None => {
            if let TargetReading::LastKnown { position } = reading {
                battle.last_known = Some(position);
            }
            pursue(battle, parts, ctx)
        }
    }
}

fn fight(
    battle: &mut BattleState,
    parts: &mut DroneParts,
    ctx: &mut ThinkContext,
    entity: EntityId,
    position: Vec2,
    velocity: Vec2,
    distance: f32,
) {
    if battle.target != Some(entity) || parts.squad.0.is_none() {
        battle.target = Some(entity);
        let enlisted = ctx.squads.enlist(parts.id, parts.squad, entity);
        if enlisted.formed {
            ctx.events.push(AiEvent::SquadFormed {
                squad: enlisted.squad,
                target: Some(entity),
            });
        }
        if let Some(squad) = enlisted.disbanded {
            ctx.events.push(AiEvent::SquadDisbanded { squad });
        }
    }
    if let Some(squad) = parts.squad.0 {
        ctx.squads.report_seen(squad, position, velocity, ctx.time);
    }

    battle.hidden_time = 0.0;
    battle.chase_wait = 0.0;
    battle.chase_failures = 0;
    battle.chasing = false;
    battle.last_known = Some(position);
    let engaged_at = *battle.engaged_at.get_or_insert(ctx.time);
    parts.intent.look_at = Some(position);

    let hurt_recently = battle
        .last_damage
        .map_or(false, |t| ctx.time - t <= ctx.config.perception.damage_memory_time);
    let ready = ctx.time - engaged_at >= BATTLE_FIRST_SHOT_DELAY || hurt_recently;
    let mut outputs = Vec::new();
    if ready && parts.params.in_attack_band(distance) {
        parts
            .attack
            .shoot(ctx.dt, parts.body.position, position, velocity, &mut outputs);
    } else {
        parts.attack.idle(ctx.dt, &mut outputs);
    }
    parts.emit_attack(outputs, ctx.events);

    position_for_fight(parts, ctx, position, distance);
}

fn position_for_fight(parts: &mut DroneParts, ctx: &mut ThinkContext, target: Vec2, distance: f32) {
    if !parts.is_mobile() {
        return;
    }
    let placement = parts
        .squad
        .0
        .and_then(|id| ctx.squads.get(id))
        .and_then(|squad| squad.placement_for(parts.id));
    if let Some(point) = placement {
        // Keep placement paths from crossing the target's line of fire
        let evade = EvadeZone {
            center: target,
            radius: parts.params.optimal_distance * 0.5,
            cost: ctx.config.evade_cost,
        };
        parts.move_to(ctx, point, SpeedClass::Run, Some(evade));
        return;
    }

    let optimal = parts.params.optimal_distance;
    if distance < optimal - BATTLE_STANDOFF_TOLERANCE {
        let away = (parts.body.position - target)
            .try_normalize()
            .unwrap_or_else(|| -unit(parts.body.angle));
        let position = parts.body.position;
        let wanted = position + away * BATTLE_RETREAT_DISTANCE;
        let goal = match ctx.physics.raycast_nearest(
            position,
            wanted,
            &RayFilter::walls(),
            parts.body.radius * 2.0,
        ) {
            Some(hit) => position + away * (hit.distance - parts.body.radius).max(0.0),
            None => wanted,
        };
        parts.move_to(ctx, goal, SpeedClass::Run, None);
    } else if distance > optimal + BATTLE_STANDOFF_TOLERANCE || !parts.params.in_attack_band(distance) {
        parts.move_to(ctx, target, SpeedClass::Run, None);
    } else {
        parts.stop(ctx);
    }
}

fn pursue(battle: &mut BattleState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    let mut outputs = Vec::new();
    parts.attack.idle(ctx.dt, &mut outputs);
    parts.emit_attack(outputs, ctx.events);

    battle.hidden_time += ctx.dt;
    if battle.hidden_time > BATTLE_LEAD_RESET_TIME {
        parts.attack.lead.clear();
    }
    parts.intent.look_at = battle.last_known;

    if parts.params.camper || !parts.is_mobile() {
        if battle.hidden_time >= CAMPER_GIVE_UP_TIME {
            return Decision::Reset;
        }
        return Decision::Stay;
    }

    battle.chase_wait += ctx.dt;
    if battle.chase_wait < parts.params.chase_wait {
        return Decision::Stay;
    }

    let squad_sighting = parts
        .squad
        .0
        .and_then(|id| ctx.squads.get(id))
        .and_then(|squad| squad.last_seen)
        .map(|s| (s.position, s.velocity));
    let own_sighting = battle.last_known.map(|position| {
        let velocity = parts.perception.last_seen_velocity().unwrap_or(Vec2::ZERO);
        (position, velocity)
    });
    let Some((last_position, last_velocity)) = squad_sighting.or(own_sighting) else {
        hand_off(parts, ctx, parts.body.position);
        return Decision::Stay;
    };

    let lead = (last_velocity * BATTLE_LEAD_TIME).clamp_length_max(BATTLE_LEAD_MAX);
    let wanted = last_position + lead;
    let goal = match ctx
        .physics
        .raycast_nearest(last_position, wanted, &RayFilter::walls(), 0.0)
    {
        Some(hit) => {
            let back = lead.try_normalize().unwrap_or(Vec2::ZERO) * parts.body.radius;
            hit.point - back
        }
        None => wanted,
    };
    battle.chasing = true;
    parts.intent.look_at = Some(goal);

    if parts.movement_failed() {
        battle.chase_failures += 1;
        if battle.chase_failures >= BATTLE_MAX_CHASE_FAILURES {
            hand_off(parts, ctx, last_position);
            return Decision::Stay;
        }
    }
    if parts.move_to(ctx, goal, SpeedClass::Run, None) == Some(MoveStatus::Arrived) {
        hand_off(parts, ctx, last_position);
    }
    Decision::Stay
}

/// Ask for a search around `center`; the squad (or just this drone) switches over.
fn hand_off(parts: &DroneParts, ctx: &mut ThinkContext, center: Vec2) {
    ctx.commands.push(AiCommand::InitSearch {
        agent: parts.id,
        squad: parts.squad.0,
        center,
    });
}
