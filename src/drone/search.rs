use crate::constants::{SEARCH_DWELL, SEARCH_FINAL_DWELL, SEARCH_SUSPICION_DECAY};
use crate::movement::{MoveStatus, SpeedClass};
use crate::perception::TargetReading;

use super::{
    call_for_help, engage, react_to_damage, sighting, Decision, DroneParts, SearchState,
    ThinkContext,
};

pub(super) fn think(search: &mut SearchState, parts: &mut DroneParts, ctx: &mut ThinkContext) -> Decision {
    if let Some(state) = react_to_damage(parts, ctx) {
        return Decision::Replace(state);
    }
    let reading = parts.perception.reading();
    if let Some((entity, position, velocity)) = sighting(reading, ctx.physics) {
        if !parts.is_mobile() && matches!(reading, TargetReading::Visible { damaging: true, .. }) {
            return Decision::Replace(call_for_help(parts, ctx, position, Some(entity)));
        }
        return Decision::Replace(engage(parts, ctx, Some(entity), Some((position, velocity)), None));
    }

    search.suspicion = (search.suspicion - SEARCH_SUSPICION_DECAY * ctx.dt).max(0.0);
    parts.perception.fov_ramp = search.suspicion;

    let Some(&goal) = search.waypoints.get(search.index) else {
        return Decision::Reset;
    };
    let last = search.index + 1 == search.waypoints.len();
    let dwell_limit = if last { SEARCH_FINAL_DWELL } else { SEARCH_DWELL };

    // Drones that can't move just watch the spot
    if !parts.is_mobile() {
        parts.intent.look_at = Some(goal);
        search.dwell += ctx.dt;
        if search.dwell >= dwell_limit {
            search.index += 1;
            search.dwell = 0.0;
        }
        return Decision::Stay;
    }

    if parts.movement_failed() {
        parts.stop(ctx);
        search.index += 1;
        search.dwell = 0.0;
        return Decision::Stay;
    }
    if parts.move_to(ctx, goal, SpeedClass::Walk, None) == Some(MoveStatus::Arrived) {
        search.dwell += ctx.dt;
        if search.dwell >= dwell_limit {
            search.index += 1;
            search.dwell = 0.0;
        }
    }
    Decision::Stay
}
