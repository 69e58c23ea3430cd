//! Drone states and the state stack.
//!
//! The stack is never empty and its bottom is always an [`IdleState`]; idle
//! variants never sit above the bottom. Every operation reports the change
//! of the top state so the owner can run leave/enter hooks.

use glam::Vec2;

use crate::movement::SpeedClass;
use crate::physics::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourcePhase {
    Going,
    Working,
    Returning,
    Resting,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IdleState {
    /// Hold (or return to) a spawn point
    Point { home: Vec2 },
    /// Shuttle between home and a resource node
    Resource {
        home: Vec2,
        node: Vec2,
        phase: ResourcePhase,
        timer: f32,
    },
    /// Cycle through waypoints
    Patrol {
        waypoints: Vec<Vec2>,
        index: usize,
        wait: f32,
    },
    /// Always pursue a known entity
    ChasePlayer { target: EntityId },
}

impl IdleState {
    pub fn resource(home: Vec2, node: Vec2) -> Self {
        IdleState::Resource {
            home,
            node,
            phase: ResourcePhase::Going,
            timer: 0.0,
        }
    }

    pub fn patrol(waypoints: Vec<Vec2>) -> Self {
        IdleState::Patrol {
            waypoints,
            index: 0,
            wait: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BattleState {
    pub target: Option<EntityId>,
    pub entered_at: f32,
    /// When the target was first seen during this battle
    pub engaged_at: Option<f32>,
    /// Time since the target was last visible
    pub hidden_time: f32,
    /// Chase throttle; chasing starts once it passes the drone's chase wait
    pub chase_wait: f32,
    pub chase_failures: u32,
    pub last_damage: Option<f32>,
    /// Own fallback when the squad has no sighting
    pub last_known: Option<Vec2>,
    pub chasing: bool,
}

impl BattleState {
    pub fn new(target: Option<EntityId>, time: f32) -> Self {
        Self {
            target,
            entered_at: time,
            engaged_at: None,
            hidden_time: 0.0,
            chase_wait: 0.0,
            chase_failures: 0,
            last_damage: None,
            last_known: None,
            chasing: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SuspectPriority {
    #[default]
    Normal,
    HelpCall,
    HighPriorityHelpCall,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SuspectState {
    pub position: Vec2,
    pub confidence: f32,
    pub priority: SuspectPriority,
    pub moving: bool,
    /// The reported position was reached (help-calls decay from then on)
    pub reached: bool,
    pub target: Option<EntityId>,
}

impl SuspectState {
    pub fn new(position: Vec2, confidence: f32, priority: SuspectPriority) -> Self {
        Self {
            position,
            confidence,
            priority,
            moving: false,
            reached: false,
            target: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchState {
    pub center: Vec2,
    pub waypoints: Vec<Vec2>,
    pub index: usize,
    pub dwell: f32,
    pub suspicion: f32,
}

impl SearchState {
    pub fn new(center: Vec2, waypoints: Vec<Vec2>, suspicion: f32) -> Self {
        Self {
            center,
            waypoints,
            index: 0,
            dwell: 0.0,
            suspicion,
        }
    }
}

/// Externally driven: no autonomy at all
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PuppetState {
    pub target: Option<Vec2>,
    pub speed: SpeedClass,
    pub facing: Option<Vec2>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum State {
    Idle(IdleState),
    Battle(BattleState),
    Suspect(SuspectState),
    Search(SearchState),
    Puppet(PuppetState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    Idle,
    Battle,
    Suspect,
    Search,
    Puppet,
}

impl State {
    pub fn kind(&self) -> StateKind {
        match self {
            State::Idle(_) => StateKind::Idle,
            State::Battle(_) => StateKind::Battle,
            State::Suspect(_) => StateKind::Suspect,
            State::Search(_) => StateKind::Search,
            State::Puppet(_) => StateKind::Puppet,
        }
    }
}

/// Change of the top state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: StateKind,
    pub to: StateKind,
}

/// What a state's think step asks of the stack
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Stay,
    Push(State),
    Replace(State),
    Pop,
    /// Drop everything above the idle bottom
    Reset,
}

#[derive(Clone, Debug)]
pub struct StateStack {
    states: Vec<State>,
}

impl StateStack {
    pub fn new(idle: IdleState) -> Self {
        Self {
            states: vec![State::Idle(idle)],
        }
    }

    #[inline]
    pub fn top(&self) -> &State {
        &self.states[self.states.len() - 1]
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut State {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    #[inline]
    pub fn top_kind(&self) -> StateKind {
        self.top().kind()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// The idle variant at the bottom
    pub fn idle(&self) -> &IdleState {
        match &self.states[0] {
            State::Idle(idle) => idle,
            other => unreachable!("non-idle state at stack bottom: {:?}", other.kind()),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.states.len() == 1
    }

    fn transition(&self, from: StateKind) -> Option<Transition> {
        Some(Transition {
            from,
            to: self.top_kind(),
        })
    }

    /// Push a state. An idle variant collapses the stack onto it instead.
    pub fn push(&mut self, state: State) -> Option<Transition> {
        if matches!(state, State::Idle(_)) {
            return self.set_single(state);
        }
        let from = self.top_kind();
        self.states.push(state);
        self.transition(from)
    }

    /// Replace the top state. A lone idle bottom is kept and `state` pushed on it.
    pub fn replace(&mut self, state: State) -> Option<Transition> {
        if matches!(state, State::Idle(_)) {
            return self.set_single(state);
        }
        let from = self.top_kind();
        if self.states.len() > 1 {
            self.states.pop();
        }
        self.states.push(state);
        self.transition(from)
    }

    /// Pop the top state. The idle bottom never pops.
    pub fn pop(&mut self) -> Option<Transition> {
        if self.states.len() == 1 {
            return None;
        }
        let from = self.top_kind();
        self.states.pop();
        self.transition(from)
    }

    /// Leave exactly one state above the idle bottom (or just the bottom).
    pub fn set_single(&mut self, state: State) -> Option<Transition> {
        let from = self.top_kind();
        self.states.truncate(1);
        match state {
            State::Idle(idle) => self.states[0] = State::Idle(idle),
            other => self.states.push(other),
        }
        self.transition(from)
    }

    /// Collapse to the idle bottom.
    pub fn reset(&mut self) -> Option<Transition> {
        if self.states.len() == 1 {
            return None;
        }
        let from = self.top_kind();
        self.states.truncate(1);
        self.transition(from)
    }

    /// Swap the idle variant at the bottom; upper states are kept.
    pub fn set_idle(&mut self, idle: IdleState) -> Option<Transition> {
        self.states[0] = State::Idle(idle);
        (self.states.len() == 1).then_some(Transition {
            from: StateKind::Idle,
            to: StateKind::Idle,
        })
    }

    pub fn apply(&mut self, decision: Decision) -> Option<Transition> {
        match decision {
            Decision::Stay => None,
            Decision::Push(state) => self.push(state),
            Decision::Replace(state) => self.replace(state),
            Decision::Pop => self.pop(),
            Decision::Reset => self.reset(),
        }
    }
}
