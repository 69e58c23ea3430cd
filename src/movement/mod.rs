//! Destination-driven locomotion.
//!
//! [`MovementController`] turns "go there" into a desired velocity: straight
//! when the way is clear, along a requested grid path otherwise, with local
//! avoidance on top. It never touches the body; the act phase writes the
//! velocity to physics.

pub mod avoidance;
pub mod rotation;

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use rotation::{facing_torque, FacingSource, RotationControl};

use crate::config::DroneParams;
use crate::constants::{
    ARRIVE_SLOWDOWN_RADIUS, GOAL_EPSILON, PATH_RETRY_DELAY, PRECISE_TOLERANCE, STUCK_MIN_PROGRESS,
    STUCK_TIME, WAYPOINT_ARRIVE_RADIUS,
};
use crate::level::LevelMap;
use crate::pathfinding::{EvadeZone, PathRequest, PathRequestId, PathService};
use crate::physics::{BodyState, EntityId, Physics, RayFilter};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedClass {
    #[default]
    Walk,
    Run,
    /// Slow, and only done when within a tight tolerance of the goal
    Precise,
}

impl SpeedClass {
    pub fn speed(self, params: &DroneParams) -> f32 {
        match self {
            SpeedClass::Walk => params.walk_speed,
            SpeedClass::Run => params.run_speed,
            SpeedClass::Precise => params.precise_speed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStatus {
    /// Already at the goal; nothing was requested
    Arrived,
    Moving,
}

/// What the controller reads each call
pub struct MoveInput<'a> {
    pub physics: &'a dyn Physics,
    pub level: &'a LevelMap,
    pub agent: EntityId,
    pub body: &'a BodyState,
    pub params: &'a DroneParams,
}

#[derive(Clone, Debug)]
pub struct MovementController {
    goal: Option<Vec2>,
    speed: SpeedClass,
    evade: Option<EvadeZone>,
    pending: Option<PathRequestId>,
    path: VecDeque<Vec2>,
    failed: bool,
    retry_in: f32,
    max_length: u32,
    stuck_time: f32,
    stuck_anchor: Vec2,
    velocity: Vec2,
}

impl MovementController {
    pub fn new(max_length: u32) -> Self {
        Self {
            goal: None,
            speed: SpeedClass::Walk,
            evade: None,
            pending: None,
            path: VecDeque::new(),
            failed: false,
            retry_in: 0.0,
            max_length,
            stuck_time: 0.0,
            stuck_anchor: Vec2::ZERO,
            velocity: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn goal(&self) -> Option<Vec2> {
        self.goal
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.goal.is_some() && !self.failed
    }

    /// The last goal could not be reached. Cleared by the next `set_target`.
    #[inline]
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    #[inline]
    pub fn is_waiting_for_path(&self) -> bool {
        self.pending.is_some()
    }

    pub fn path(&self) -> impl Iterator<Item = &Vec2> {
        self.path.iter()
    }

    pub fn next_waypoint(&self) -> Option<Vec2> {
        self.path.front().copied()
    }

    /// Desired velocity from the last update
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Same cell for walking and running, tight tolerance for precise moves.
    pub fn is_reached(level: &LevelMap, position: Vec2, goal: Vec2, speed: SpeedClass) -> bool {
        match speed {
            SpeedClass::Precise => position.distance(goal) <= PRECISE_TOLERANCE,
            _ => level.cell_coord(position) == level.cell_coord(goal),
        }
    }

    /// Head for `goal`. Repeating the current goal does nothing, and a goal
    /// in the same cell as a failed one waits out `PATH_RETRY_DELAY` first.
    pub fn set_target(
        &mut self,
        input: &MoveInput,
        paths: &mut PathService,
        goal: Vec2,
        speed: SpeedClass,
        evade: Option<EvadeZone>,
    ) -> MoveStatus {
        if Self::is_reached(input.level, input.body.position, goal, speed) {
            self.stop(paths);
            return MoveStatus::Arrived;
        }
        if let Some(current) = self.goal {
            if !self.failed && current.distance(goal) < GOAL_EPSILON && self.evade == evade {
                self.speed = speed;
                return MoveStatus::Moving;
            }
            let level = input.level;
            let same_cell = level.cell_coord(current) == level.cell_coord(goal);
            if self.failed && self.retry_in > 0.0 && same_cell {
                return MoveStatus::Moving;
            }
        }

        self.cancel_request(paths);
        self.goal = Some(goal);
        self.speed = speed;
        self.evade = evade;
        self.failed = false;
        self.path.clear();
        self.stuck_time = 0.0;
        self.stuck_anchor = input.body.position;

        let position = input.body.position;
        let direct = evade.is_none()
            && input
                .physics
                .line_clear(position, goal, &RayFilter::walls(), input.body.radius * 2.0);
        if direct {
            self.path.push_back(goal);
        } else {
            self.request_path(paths, position);
        }
        MoveStatus::Moving
    }

    /// Drop the goal and any in-flight request.
    pub fn stop(&mut self, paths: &mut PathService) {
        self.cancel_request(paths);
        self.goal = None;
        self.path.clear();
        self.failed = false;
        self.velocity = Vec2::ZERO;
    }

    fn cancel_request(&mut self, paths: &mut PathService) {
        if let Some(id) = self.pending.take() {
            paths.cancel(id);
        }
    }

    fn request_path(&mut self, paths: &mut PathService, start: Vec2) {
        let Some(goal) = self.goal else {
            return;
        };
        self.cancel_request(paths);
        self.pending = Some(paths.request(PathRequest {
            start,
            goal,
            max_length: self.max_length,
            evade: self.evade,
        }));
    }

    /// Advance along the path and return the desired velocity.
    pub fn update(&mut self, input: &MoveInput, paths: &mut PathService, dt: f32) -> Vec2 {
        puffin::profile_function!();
        self.retry_in = (self.retry_in - dt).max(0.0);
        if let Some(id) = self.pending {
            if let Some(outcome) = paths.poll(id) {
                self.pending = None;
                if outcome.not_found {
                    tracing::debug!("{:?} has no path to {:?}", input.agent, self.goal);
                    self.failed = true;
                    self.retry_in = PATH_RETRY_DELAY;
                    self.path.clear();
                } else {
                    self.path = outcome.points.into_iter().skip(1).collect();
                }
            }
        }

        self.velocity = Vec2::ZERO;
        let Some(goal) = self.goal else {
            return Vec2::ZERO;
        };
        if self.failed || self.path.is_empty() {
            return Vec2::ZERO;
        }

        let position = input.body.position;
        while self.path.len() > 1 && position.distance(self.path[0]) < WAYPOINT_ARRIVE_RADIUS {
            self.path.pop_front();
        }
        if self.path.len() == 1 && Self::is_reached(input.level, position, goal, self.speed) {
            self.goal = None;
            self.path.clear();
            return Vec2::ZERO;
        }

        let Some(&waypoint) = self.path.front() else {
            return Vec2::ZERO;
        };
        let offset = waypoint - position;
        let distance = offset.length();
        let mut speed = self.speed.speed(input.params);
        if self.path.len() == 1 && distance < ARRIVE_SLOWDOWN_RADIUS {
            speed *= (distance / ARRIVE_SLOWDOWN_RADIUS).max(0.25);
        }

        if position.distance(self.stuck_anchor) > STUCK_MIN_PROGRESS {
            self.stuck_anchor = position;
            self.stuck_time = 0.0;
        } else {
            self.stuck_time += dt;
            if self.stuck_time >= STUCK_TIME {
                tracing::debug!("{:?} stuck at {:?}, re-pathing", input.agent, position);
                self.stuck_time = 0.0;
                self.path.clear();
                self.request_path(paths, position);
                return Vec2::ZERO;
            }
        }

        let desired = offset.normalize_or_zero() * speed;
        self.velocity = avoidance::steer(input.physics, input.agent, input.body, desired);
        self.velocity
    }
}
