//! AI event queue for decoupled communication with the host.
//!
//! The AI pushes events during a tick; the host drains them afterwards to
//! spawn projectiles, play effects, or log.

use glam::Vec2;

use crate::drone::{AttackEffect, StateKind};
use crate::physics::EntityId;
use crate::squad::SquadId;

/// Events the AI emits for the host to react to
#[derive(Debug, Clone, PartialEq)]
pub enum AiEvent {
    /// The top of a drone's state stack changed
    StateChanged {
        agent: EntityId,
        from: StateKind,
        to: StateKind,
    },
    /// A drone wants a shot fired toward `aim`
    Fire {
        shooter: EntityId,
        aim: Vec2,
    },
    /// A continuous attack effect (laser sight, charge glow) started
    EffectStarted {
        agent: EntityId,
        effect: AttackEffect,
    },
    EffectStopped {
        agent: EntityId,
        effect: AttackEffect,
    },
    /// A disturbance was broadcast through nearby rooms
    HelpCall {
        origin: Vec2,
        responder: Option<EntityId>,
    },
    SquadFormed {
        squad: SquadId,
        target: Option<EntityId>,
    },
    SquadDisbanded {
        squad: SquadId,
    },
    SearchStarted {
        squad: Option<SquadId>,
        center: Vec2,
    },
    /// A movement goal could not be reached
    PathFailed {
        agent: EntityId,
        goal: Vec2,
    },
}

/// Simple event queue - events are pushed during a tick, drained by the host
#[derive(Default)]
pub struct EventQueue {
    events: Vec<AiEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event to be processed later
    pub fn push(&mut self, event: AiEvent) {
        self.events.push(event);
    }

    /// Drain all events for processing
    pub fn drain(&mut self) -> impl Iterator<Item = AiEvent> + '_ {
        self.events.drain(..)
    }

    /// Pending events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &AiEvent> {
        self.events.iter()
    }

    /// Check if there are pending events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
