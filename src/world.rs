//! The AI world: drone registry, squads, path service and the tick.
//!
//! Drones live in a `hecs::World` keyed by their physics body id. One tick
//! runs four phases:
//! 1. think: perception and the state machine, per active drone in id order;
//!    cross-drone commands are applied right after the issuing drone
//! 2. paths: the path service resolves queued requests within its budget
//! 3. act: movement and rotation, written to physics as target velocity/torque
//! 4. squads: area-of-sight placement, search consensus, cleanup

use glam::Vec2;
use hecs::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::active_ai_tracker::ActiveAiTracker;
use crate::config::{AiConfig, DroneParams, HelpResponse};
use crate::constants::{
    SEARCH_INITIAL_SUSPICION, SUSPECT_HELP_CALL_CONFIDENCE, SUSPECT_HIGH_PRIORITY_CONFIDENCE,
};
use crate::debug::{DebugColor, DebugSink};
use crate::drone::{
    self, AiCommand, AttackStrategy, BattleState, DroneParts, HookParts, IdleState, Intent,
    PuppetState, SearchState, Shared, State, StateKind, StateStack, SuspectPriority, SuspectState,
    ThinkContext, Transition,
};
use crate::error::{AiError, Result};
use crate::events::{AiEvent, EventQueue};
use crate::level::LevelMap;
use crate::movement::{facing_torque, MoveInput, MovementController, RotationControl, SpeedClass};
use crate::pathfinding::PathService;
use crate::perception::{Perception, SenseInput, SightMode, TargetReading};
use crate::physics::{BodyKind, EntityId, Physics};
use crate::squad::{help, search, AosRequest, SquadArena, SquadId, SquadLink};
use crate::time_system::GameClock;

pub struct AiWorld {
    agents: World,
    squads: SquadArena,
    paths: PathService,
    tracker: ActiveAiTracker,
    events: EventQueue,
    clock: GameClock,
    rng: ChaCha8Rng,
    config: AiConfig,
    /// World-wide hunted entity for direct-sight drones without an override
    hunted: Option<EntityId>,
    commands: Vec<AiCommand>,
}

impl AiWorld {
    /// Build a world for `level`.
    ///
    /// # Panics
    ///
    /// If `config` fails [`AiConfig::validate`]. Configs loaded through
    /// [`AiConfig::from_json_str`] are already validated.
    pub fn new(config: AiConfig, level: &LevelMap) -> Self {
        let mut paths = PathService::new(config.path, config.path_budget);
        paths.rebuild(level);
        tracing::info!(
            "AI world {}x{} (seed {}, {} sectors)",
            level.width,
            level.height,
            config.seed,
            config.squad.aos_sectors
        );
        Self {
            agents: World::new(),
            squads: SquadArena::new(config.squad.aos_sectors),
            paths,
            tracker: ActiveAiTracker::new(),
            events: EventQueue::new(),
            clock: GameClock::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            hunted: None,
            commands: Vec::new(),
        }
    }

    /// Re-read the level's walls after it changed.
    pub fn rebuild_level(&mut self, level: &LevelMap) {
        self.paths.rebuild(level);
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<AiEvent> {
        self.events.drain().collect()
    }

    pub fn squads(&self) -> &SquadArena {
        &self.squads
    }

    pub fn hunted(&self) -> Option<EntityId> {
        self.hunted
    }

    pub fn set_hunted(&mut self, target: Option<EntityId>) {
        self.hunted = target;
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len() as usize
    }

    pub fn contains(&self, agent: EntityId) -> bool {
        self.agents.contains(agent)
    }

    pub fn is_active(&self, agent: EntityId) -> bool {
        self.tracker.is_active(agent)
    }

    pub fn top_state(&self, agent: EntityId) -> Option<State> {
        let stack = self.agents.get::<&StateStack>(agent).ok()?;
        Some(stack.top().clone())
    }

    pub fn state_kind(&self, agent: EntityId) -> Option<StateKind> {
        let stack = self.agents.get::<&StateStack>(agent).ok()?;
        Some(stack.top_kind())
    }

    pub fn stack_len(&self, agent: EntityId) -> Option<usize> {
        let stack = self.agents.get::<&StateStack>(agent).ok()?;
        Some(stack.len())
    }

    pub fn squad_of(&self, agent: EntityId) -> Option<SquadId> {
        self.agents.get::<&SquadLink>(agent).ok().and_then(|link| link.0)
    }

    pub fn reading(&self, agent: EntityId) -> Option<TargetReading> {
        let perception = self.agents.get::<&Perception>(agent).ok()?;
        Some(perception.reading())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register the body `body` as a drone.
    pub fn spawn_drone(
        &mut self,
        physics: &dyn Physics,
        body: EntityId,
        params: DroneParams,
        idle: IdleState,
    ) -> Result<()> {
        let Some(state) = physics.body(body) else {
            return Err(AiError::UnknownAgent(body));
        };
        if self.agents.contains(body) {
            return Err(AiError::AlreadyRegistered(body));
        }

        let mobile = params.mobile;
        let perception = Perception::for_params(&params);
        let attack = AttackStrategy::new(params.attack);
        self.agents.spawn_at(
            body,
            (
                params,
                StateStack::new(idle),
                perception,
                attack,
                RotationControl::new(state.angle),
                SquadLink::default(),
                Intent::default(),
            ),
        );
        if mobile {
            self.agents
                .insert_one(body, MovementController::new(self.config.max_path_length))
                .map_err(|_| AiError::UnknownAgent(body))?;
        }
        self.tracker.register(body);
        tracing::debug!("Spawned drone {:?} (mobile: {})", body, mobile);
        Ok(())
    }

    /// Remove a drone, releasing its squad and any path request.
    pub fn despawn(&mut self, agent: EntityId) -> Result<()> {
        let (movement, attack, link) = self
            .agents
            .query_one_mut::<(Option<&mut MovementController>, &mut AttackStrategy, &mut SquadLink)>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        if let Some(movement) = movement {
            movement.stop(&mut self.paths);
        }
        let mut outputs = Vec::new();
        attack.reset(&mut outputs);
        drone::emit_attack(agent, outputs, &mut self.events);
        if let Some(squad) = self.squads.leave(agent, link) {
            self.events.push(AiEvent::SquadDisbanded { squad });
        }

        self.agents
            .despawn(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        self.tracker.remove(agent);
        tracing::debug!("Despawned drone {:?}", agent);
        Ok(())
    }

    /// Offline drones are skipped by the tick entirely.
    pub fn set_online(&mut self, agent: EntityId, online: bool) -> Result<()> {
        if !self.agents.contains(agent) {
            return Err(AiError::UnknownAgent(agent));
        }
        if !online {
            if let Ok(movement) = self.agents.query_one_mut::<&mut MovementController>(agent) {
                movement.stop(&mut self.paths);
            }
        }
        self.tracker.set_online(agent, online);
        Ok(())
    }

    /// Cull online drones by distance from `focus`. Returns the drones that woke up.
    pub fn update_activation(&mut self, physics: &dyn Physics, focus: Vec2) -> Vec<EntityId> {
        let positions: Vec<(EntityId, Vec2)> = self
            .agents
            .iter()
            .filter_map(|entity| {
                let id = entity.entity();
                physics.body(id).map(|body| (id, body.position))
            })
            .collect();
        let woke = self
            .tracker
            .update_activation(focus, self.config.active_radius, positions);
        if !woke.is_empty() {
            tracing::trace!("{} drones woke up", woke.len());
        }
        woke
    }

    // =========================================================================
    // State stack control
    // =========================================================================

    /// Change a drone's stack and run the transition hooks.
    fn change_state(
        &mut self,
        agent: EntityId,
        change: impl FnOnce(&mut StateStack) -> Option<Transition>,
    ) -> Result<Option<Transition>> {
        let (stack, perception, movement, attack, squad) = self
            .agents
            .query_one_mut::<(
                &mut StateStack,
                &mut Perception,
                Option<&mut MovementController>,
                &mut AttackStrategy,
                &mut SquadLink,
            )>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;

        let transition = change(&mut *stack);
        if let Some(transition) = transition {
            let parts = HookParts {
                id: agent,
                perception,
                movement,
                attack,
                squad,
            };
            let mut shared = Shared {
                paths: &mut self.paths,
                squads: &mut self.squads,
                events: &mut self.events,
            };
            drone::on_transition(transition, stack, parts, &mut shared);
        }
        Ok(transition)
    }

    pub fn add_state(&mut self, agent: EntityId, state: State) -> Result<Option<Transition>> {
        self.change_state(agent, |stack| stack.push(state))
    }

    pub fn replace_state(&mut self, agent: EntityId, state: State) -> Result<Option<Transition>> {
        self.change_state(agent, |stack| stack.replace(state))
    }

    /// Pop the top state. The idle bottom stays.
    pub fn remove_state(&mut self, agent: EntityId) -> Result<Option<Transition>> {
        self.change_state(agent, |stack| stack.pop())
    }

    pub fn set_single_state(&mut self, agent: EntityId, state: State) -> Result<Option<Transition>> {
        self.change_state(agent, |stack| stack.set_single(state))
    }

    /// Swap the idle bottom, keeping any states above it.
    pub fn set_idle_state(&mut self, agent: EntityId, idle: IdleState) -> Result<Option<Transition>> {
        self.change_state(agent, |stack| stack.set_idle(idle))
    }

    /// Force a drone into battle, joining the squad hunting `target`.
    pub fn set_battle_state(
        &mut self,
        physics: &dyn Physics,
        agent: EntityId,
        target: Option<EntityId>,
    ) -> Result<Option<Transition>> {
        if let Some(target) = target {
            let link = self
                .agents
                .query_one_mut::<&mut SquadLink>(agent)
                .map_err(|_| AiError::UnknownAgent(agent))?;
            let enlisted = self.squads.enlist(agent, link, target);
            if enlisted.formed {
                self.events.push(AiEvent::SquadFormed {
                    squad: enlisted.squad,
                    target: Some(target),
                });
            }
            if let Some(squad) = enlisted.disbanded {
                self.events.push(AiEvent::SquadDisbanded { squad });
            }
        }

        let mut battle = BattleState::new(target, self.clock.time);
        battle.last_known = target.and_then(|t| physics.body(t)).map(|b| b.position);
        self.change_state(agent, |stack| {
            if stack.is_idle() {
                stack.push(State::Battle(battle))
            } else {
                stack.replace(State::Battle(battle))
            }
        })
    }

    /// Drive a drone by hand. Switches it to a lone puppet state if needed.
    pub fn puppet_move(
        &mut self,
        agent: EntityId,
        target: Option<Vec2>,
        speed: SpeedClass,
        facing: Option<Vec2>,
    ) -> Result<()> {
        let mobile = self
            .agents
            .entity(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?
            .has::<MovementController>();
        if target.is_some() && !mobile {
            return Err(AiError::NoMovement(agent));
        }

        let puppet = PuppetState {
            target,
            speed,
            facing,
        };
        let stack = self
            .agents
            .query_one_mut::<&mut StateStack>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        if let State::Puppet(state) = stack.top_mut() {
            *state = puppet;
            return Ok(());
        }
        self.set_single_state(agent, State::Puppet(puppet))?;
        Ok(())
    }

    // =========================================================================
    // Perception input
    // =========================================================================

    /// Latch damage for the drone's next think.
    pub fn notify_damage(
        &mut self,
        agent: EntityId,
        source: Option<EntityId>,
        source_position: Option<Vec2>,
    ) -> Result<()> {
        let perception = self
            .agents
            .query_one_mut::<&mut Perception>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        perception.notify_damage(source, source_position, self.clock.time);
        Ok(())
    }

    pub fn on_sensor_enter(&mut self, agent: EntityId, entity: EntityId) -> Result<()> {
        let perception = self
            .agents
            .query_one_mut::<&mut Perception>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        perception.on_sensor_enter(entity);
        Ok(())
    }

    pub fn on_sensor_exit(&mut self, agent: EntityId, entity: EntityId) -> Result<()> {
        let perception = self
            .agents
            .query_one_mut::<&mut Perception>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        perception.on_sensor_exit(entity);
        Ok(())
    }

    /// Feed sensor drones from circle overlaps, for hosts without sensor shapes.
    pub fn sync_sensors(&mut self, physics: &dyn Physics) {
        puffin::profile_function!();
        for (agent, (params, perception)) in self.agents.query_mut::<(&DroneParams, &mut Perception)>() {
            let Some(body) = physics.body(agent) else {
                continue;
            };
            let inside: Vec<EntityId> = physics
                .query_circle(body.position, params.detect_radius)
                .into_iter()
                .filter(|&entity| {
                    entity != agent
                        && physics
                            .body(entity)
                            .map_or(false, |b| b.kind == BodyKind::Dynamic && !b.is_agent)
                })
                .collect();
            let gone: Vec<EntityId> = match perception.mode() {
                SightMode::Sensor(tracker) => tracker
                    .candidates()
                    .iter()
                    .copied()
                    .filter(|entity| !inside.contains(entity))
                    .collect(),
                SightMode::Direct { .. } => continue,
            };
            for entity in gone {
                perception.on_sensor_exit(entity);
            }
            for entity in inside {
                perception.on_sensor_enter(entity);
            }
        }
    }

    // =========================================================================
    // Squad control
    // =========================================================================

    /// Retarget the drone's squad (or just the drone) onto `target`.
    pub fn report_target(&mut self, agent: EntityId, target: EntityId) -> Result<()> {
        let link = *self
            .agents
            .get::<&SquadLink>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        let members = match link.0.and_then(|id| self.squads.get(id)) {
            Some(squad) => squad.members().to_vec(),
            None => vec![agent],
        };
        if let Some(id) = link.0 {
            self.squads.report_target(id, target);
        }
        for member in members {
            if let Ok(perception) = self.agents.query_one_mut::<&mut Perception>(member) {
                perception.set_target_override(Some(target));
            }
        }
        tracing::debug!("{:?} retargeted onto {:?}", agent, target);
        Ok(())
    }

    /// `target` is gone: disband every squad hunting it and return members to idle.
    pub fn no_target(&mut self, target: EntityId) {
        if self.hunted == Some(target) {
            self.hunted = None;
        }

        for (_, perception) in self.agents.query_mut::<&mut Perception>() {
            if matches!(perception.mode(), SightMode::Direct { target: Some(t) } if *t == target) {
                perception.set_target_override(None);
            }
            perception.on_sensor_exit(target);
        }

        let hunting: Vec<SquadId> = self
            .squads
            .ids()
            .into_iter()
            .filter(|&id| self.squads.get(id).map_or(false, |s| s.target == Some(target)))
            .collect();
        for id in hunting {
            let members = self
                .squads
                .get(id)
                .map(|s| s.members().to_vec())
                .unwrap_or_default();
            for &member in &members {
                if let Err(error) = self.change_state(member, |stack| stack.reset()) {
                    tracing::warn!("Failed to reset {:?}: {}", member, error);
                }
            }
            // Members already idle never left through the hooks
            for member in members {
                if let Ok(link) = self.agents.query_one_mut::<&mut SquadLink>(member) {
                    if let Some(squad) = self.squads.leave(member, link) {
                        self.events.push(AiEvent::SquadDisbanded { squad });
                    }
                }
            }
            if self.squads.destroy(id) {
                self.events.push(AiEvent::SquadDisbanded { squad: id });
            }
            tracing::info!("Squad {:?} lost its target {:?}", id, target);
        }
    }

    /// Send the nearest idle non-camper drone to look at `position`.
    pub fn proxy_inspect(&mut self, physics: &dyn Physics, position: Vec2) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for (agent, (params, stack, _)) in self
            .agents
            .query::<(&DroneParams, &StateStack, &MovementController)>()
            .iter()
        {
            if params.camper || !stack.is_idle() || !self.tracker.is_online(agent) {
                continue;
            }
            let Some(body) = physics.body(agent) else {
                continue;
            };
            let distance = body.position.distance(position);
            let closer = best.map_or(true, |(d, id)| distance < d || (distance == d && agent < id));
            if closer {
                best = Some((distance, agent));
            }
        }

        let (_, agent) = best?;
        let suspect = SuspectState::new(position, SUSPECT_HELP_CALL_CONFIDENCE, SuspectPriority::HelpCall);
        if let Err(error) = self.add_state(agent, State::Suspect(suspect)) {
            tracing::warn!("Proxy inspect by {:?} failed: {}", agent, error);
            return None;
        }
        tracing::debug!("{:?} inspects {:?}", agent, position);
        Some(agent)
    }

    /// Broadcast a disturbance at `origin` as if a drone had called for help.
    pub fn raise_alarm(
        &mut self,
        physics: &dyn Physics,
        level: &LevelMap,
        origin: Vec2,
        target: Option<EntityId>,
    ) -> Option<EntityId> {
        self.help_call(physics, level, None, origin, target)
    }

    fn help_call(
        &mut self,
        physics: &dyn Physics,
        level: &LevelMap,
        caller: Option<EntityId>,
        origin: Vec2,
        target: Option<EntityId>,
    ) -> Option<EntityId> {
        puffin::profile_function!();
        let radius = self.config.squad.help_radius;
        let rooms = help::flood_rooms(level, origin, radius);

        let mut heard = Vec::new();
        for (agent, (params, stack, movement)) in self
            .agents
            .query::<(&DroneParams, &StateStack, Option<&MovementController>)>()
            .iter()
        {
            if Some(agent) == caller || !self.tracker.is_online(agent) {
                continue;
            }
            let Some(body) = physics.body(agent) else {
                continue;
            };
            if !help::hears(level, &rooms, origin, radius, body.position) {
                continue;
            }
            let candidate = help::Candidate {
                agent,
                position: body.position,
                response: params.help_response,
                camper: params.camper,
                mobile: movement.is_some(),
                idle: stack.is_idle(),
            };
            heard.push((candidate, stack.top_kind()));
        }
        heard.sort_by_key(|(c, _)| c.agent);

        let candidates: Vec<help::Candidate> = heard.iter().map(|(c, _)| *c).collect();
        let responder = help::best_responder(&candidates, origin);
        tracing::info!(
            "Help-call at {:?}: {} heard, responder {:?}",
            origin,
            heard.len(),
            responder
        );
        self.events.push(AiEvent::HelpCall { origin, responder });

        if let Some(agent) = responder {
            let mut suspect = SuspectState::new(origin, SUSPECT_HELP_CALL_CONFIDENCE, SuspectPriority::HelpCall);
            suspect.target = target;
            if let Err(error) = self.add_state(agent, State::Suspect(suspect)) {
                tracing::warn!("Help-call responder {:?} failed: {}", agent, error);
            }
            return Some(agent);
        }

        // Nobody free to answer: everyone who heard it joins in
        for (candidate, kind) in heard {
            if candidate.response == HelpResponse::Ignore || kind == StateKind::Battle {
                continue;
            }
            let result = match target {
                Some(_) => self.set_battle_state(physics, candidate.agent, target),
                None => {
                    let mut suspect = SuspectState::new(
                        origin,
                        SUSPECT_HIGH_PRIORITY_CONFIDENCE,
                        SuspectPriority::HighPriorityHelpCall,
                    );
                    suspect.reached = !candidate.mobile;
                    self.change_state(candidate.agent, |stack| {
                        if stack.is_idle() {
                            stack.push(State::Suspect(suspect))
                        } else {
                            stack.replace(State::Suspect(suspect))
                        }
                    })
                }
            };
            if let Err(error) = result {
                tracing::warn!("Help-call escalation for {:?} failed: {}", candidate.agent, error);
            }
        }
        None
    }

    /// Hand the squad (or a lone drone) over to a search around `center`.
    fn init_search(
        &mut self,
        physics: &dyn Physics,
        level: &LevelMap,
        agent: EntityId,
        squad: Option<SquadId>,
        center: Vec2,
    ) {
        let members = match squad.and_then(|id| self.squads.get_mut(id)) {
            Some(squad) if !squad.searching => {
                squad.searching = true;
                squad.members().to_vec()
            }
            _ => vec![agent],
        };

        let mut searchers = Vec::with_capacity(members.len());
        for member in members {
            let Some(body) = physics.body(member) else {
                continue;
            };
            let Ok((params, stack, movement)) = self
                .agents
                .query_one_mut::<(&DroneParams, &StateStack, Option<&MovementController>)>(member)
            else {
                continue;
            };
            if stack.top_kind() != StateKind::Battle {
                continue;
            }
            searchers.push(search::Searcher {
                agent: member,
                position: body.position,
                camper: params.camper || movement.is_none(),
            });
        }
        if searchers.is_empty() {
            return;
        }

        let plan = search::plan_search(level, &self.config.squad, center, &searchers);
        tracing::info!(
            "Search at {:?} for squad {:?}: {} searchers, {} campers",
            center,
            squad,
            plan.assignments.len(),
            plan.campers.len()
        );
        self.events.push(AiEvent::SearchStarted { squad, center });

        for assignment in plan.assignments {
            let state = State::Search(SearchState::new(
                center,
                assignment.waypoints,
                SEARCH_INITIAL_SUSPICION,
            ));
            if let Err(error) = self.replace_state(assignment.agent, state) {
                tracing::warn!("Search assignment for {:?} failed: {}", assignment.agent, error);
            }
        }
        for camper in plan.campers {
            if let Err(error) = self.change_state(camper, |stack| stack.reset()) {
                tracing::warn!("Camper {:?} failed to stand down: {}", camper, error);
            }
        }
    }

    fn apply_commands(&mut self, physics: &dyn Physics, level: &LevelMap) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                AiCommand::HelpCall {
                    caller,
                    origin,
                    target,
                } => {
                    self.help_call(physics, level, caller, origin, target);
                }
                AiCommand::InitSearch {
                    agent,
                    squad,
                    center,
                } => self.init_search(physics, level, agent, squad, center),
                AiCommand::ProxyInspect { position } => {
                    self.proxy_inspect(physics, position);
                }
            }
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance the AI by one fixed step.
    ///
    /// Phases run in order: think, paths, act, squads. Active drones think
    /// in id order. Commands a drone issues for other drones (help-calls,
    /// search hand-offs, proxy inspections) are applied as soon as that drone
    /// has thought, so drones later in the order see them within the same
    /// tick. Everything a tick changes is settled before the next one starts.
    pub fn tick(&mut self, physics: &mut dyn Physics, level: &LevelMap) {
        puffin::profile_function!();
        self.clock.advance();
        let agents = self.tracker.active_sorted();

        {
            puffin::profile_scope!("think");
            for &agent in &agents {
                self.think_agent(&*physics, level, agent);
                self.apply_commands(&*physics, level);
            }
        }
        {
            puffin::profile_scope!("paths");
            self.paths.process(level);
        }
        {
            puffin::profile_scope!("act");
            for &agent in &agents {
                self.act_agent(physics, level, agent);
            }
        }
        {
            puffin::profile_scope!("squads");
            self.squad_phase(&*physics, level);
        }
    }

    fn think_agent(&mut self, physics: &dyn Physics, level: &LevelMap, agent: EntityId) {
        let Some(body) = physics.body(agent) else {
            return;
        };
        let Ok((params, stack, movement, perception, attack, squad, intent)) =
            self.agents.query_one_mut::<(
                &DroneParams,
                &mut StateStack,
                Option<&mut MovementController>,
                &mut Perception,
                &mut AttackStrategy,
                &mut SquadLink,
                &mut Intent,
            )>(agent)
        else {
            return;
        };

        perception.update(&SenseInput {
            physics,
            agent,
            body: &body,
            hunted: self.hunted,
            params,
            config: &self.config.perception,
            time: self.clock.time,
        });

        let mut ctx = ThinkContext {
            physics,
            level,
            paths: &mut self.paths,
            squads: &mut self.squads,
            config: &self.config,
            events: &mut self.events,
            commands: &mut self.commands,
            time: self.clock.time,
            dt: self.clock.dt,
        };
        let mut parts = DroneParts {
            id: agent,
            body,
            params,
            perception,
            movement,
            attack,
            squad,
            intent,
        };
        drone::think(stack, &mut parts, &mut ctx);
    }

    fn act_agent(&mut self, physics: &mut dyn Physics, level: &LevelMap, agent: EntityId) {
        let Some(body) = physics.body(agent) else {
            return;
        };
        let dt = self.clock.dt;
        let Ok((params, movement, rotation, intent)) = self.agents.query_one_mut::<(
            &DroneParams,
            Option<&mut MovementController>,
            &mut RotationControl,
            &Intent,
        )>(agent) else {
            return;
        };

        let mut waypoint = None;
        if let Some(movement) = movement {
            let was_failed = movement.has_failed();
            let velocity = {
                let input = MoveInput {
                    physics: &*physics,
                    level,
                    agent,
                    body: &body,
                    params,
                };
                movement.update(&input, &mut self.paths, dt)
            };
            if !was_failed && movement.has_failed() {
                if let Some(goal) = movement.goal() {
                    self.events.push(AiEvent::PathFailed { agent, goal });
                }
            }
            if movement.is_moving() {
                waypoint = movement.next_waypoint().map(|p| p - body.position);
            }
            physics.set_target_velocity(agent, velocity);
        }

        let view = intent.look_at.map(|p| p - body.position);
        let facing = rotation.update(body.angle, view, waypoint, dt, &mut self.rng);
        physics.set_target_torque(agent, facing_torque(&body, facing, params.rotation_speed));
    }

    fn squad_phase(&mut self, physics: &dyn Physics, level: &LevelMap) {
        let dt = self.clock.dt;
        let mut searches = Vec::new();
        let mut lost = Vec::new();

        for id in self.squads.ids() {
            let Some(squad) = self.squads.get(id) else {
                continue;
            };
            if let Some(target) = squad.target {
                if physics.body(target).is_none() {
                    lost.push(target);
                    continue;
                }
            }

            let seen = squad.seen_this_tick();
            let sighting = squad.last_seen;
            let members = squad.members().to_vec();

            if let (true, Some(sighting)) = (seen, sighting) {
                let mut requests = Vec::new();
                for &member in &members {
                    let Some(body) = physics.body(member) else {
                        continue;
                    };
                    let Ok((params, stack, _)) = self
                        .agents
                        .query_one_mut::<(&DroneParams, &StateStack, &MovementController)>(member)
                    else {
                        continue;
                    };
                    if stack.top_kind() != StateKind::Battle {
                        continue;
                    }
                    requests.push(AosRequest {
                        agent: member,
                        position: body.position,
                        priority: params.placement_priority,
                        optimal: params.optimal_distance,
                        band: (params.attack_range_min, params.attack_range_max),
                        free_radius: params.free_radius,
                    });
                }
                let Some(squad) = self.squads.get_mut(id) else {
                    continue;
                };
                if requests.is_empty() {
                    squad.set_placements(Vec::new());
                } else {
                    let range = requests.iter().map(|r| r.band.1).fold(0.0, f32::max);
                    squad
                        .aos
                        .begin(sighting.position, physics, range, self.config.squad.aos_wall_margin);
                    for request in requests {
                        squad.aos.feed(request);
                    }
                    let placements = squad.aos.place_end();
                    squad.set_placements(placements);
                }
            }

            let Some(squad) = self.squads.get_mut(id) else {
                continue;
            };
            if !seen {
                squad.set_placements(Vec::new());
            }
            squad.end_tick(dt);
            if !squad.searching && squad.unseen_time >= self.config.squad.consensus_time {
                if let (Some(sighting), Some(&first)) = (squad.last_seen, members.first()) {
                    searches.push((first, id, sighting.position));
                }
            }
        }

        for target in lost {
            tracing::debug!("Squad target {:?} vanished", target);
            self.no_target(target);
        }
        for (agent, squad, center) in searches {
            self.init_search(physics, level, agent, Some(squad), center);
        }
    }

    // =========================================================================
    // Debug
    // =========================================================================

    /// Human-readable dump of one drone.
    pub fn describe(&self, agent: EntityId) -> Result<String> {
        let mut query = self
            .agents
            .query_one::<(
                &DroneParams,
                &StateStack,
                Option<&MovementController>,
                &Perception,
                &AttackStrategy,
                &SquadLink,
            )>(agent)
            .map_err(|_| AiError::UnknownAgent(agent))?;
        let Some((params, stack, movement, perception, attack, squad)) = query.get() else {
            return Err(AiError::UnknownAgent(agent));
        };

        let online = if self.tracker.is_active(agent) {
            "active"
        } else if self.tracker.is_dormant(agent) {
            "dormant"
        } else {
            "offline"
        };
        let states: Vec<String> = stack.iter().map(|s| format!("{:?}", s.kind())).collect();
        let mut lines = vec![
            format!("drone {:?} ({})", agent, online),
            format!("  stack: {}", states.join(" > ")),
        ];
        match stack.top() {
            State::Suspect(s) => lines.push(format!(
                "  confidence {:.2} at ({:.1}, {:.1}), {:?}",
                s.confidence, s.position.x, s.position.y, s.priority
            )),
            State::Battle(b) => lines.push(format!(
                "  target {:?}, hidden {:.1}s, chase failures {}",
                b.target, b.hidden_time, b.chase_failures
            )),
            State::Search(s) => lines.push(format!(
                "  waypoint {}/{}, suspicion {:.2}",
                s.index,
                s.waypoints.len(),
                s.suspicion
            )),
            State::Idle(_) | State::Puppet(_) => {}
        }
        lines.push(format!("  reading: {:?}", perception.reading()));
        if let Some(seen) = perception.last_seen_time() {
            lines.push(format!("  last seen {:.1}s ago", self.clock.time - seen));
        }
        lines.push(format!("  squad: {:?}", squad.0));
        match movement {
            Some(m) => lines.push(format!(
                "  goal: {:?}{}, failed: {}, velocity ({:.1}, {:.1})",
                m.goal(),
                if m.is_waiting_for_path() { " (pathing)" } else { "" },
                m.has_failed(),
                m.velocity().x,
                m.velocity().y
            )),
            None => lines.push("  immobile".to_owned()),
        }
        lines.push(format!(
            "  attack: {:?}{}, band {:.1}..{:.1}",
            attack.kind(),
            if attack.is_charging() { " (charging)" } else { "" },
            params.attack_range_min,
            params.attack_range_max
        ));
        Ok(lines.join("\n"))
    }

    /// Draw every drone's state, facing intent and path, plus squad sectors.
    pub fn draw_debug(&self, physics: &dyn Physics, sink: &mut dyn DebugSink) {
        for (agent, (stack, movement, intent)) in self
            .agents
            .query::<(&StateStack, Option<&MovementController>, &Intent)>()
            .iter()
        {
            let Some(body) = physics.body(agent) else {
                continue;
            };
            let (label, color) = match stack.top() {
                State::Idle(_) => ("idle".to_owned(), DebugColor::White),
                State::Suspect(s) => (format!("suspect {:.2}", s.confidence), DebugColor::Yellow),
                State::Battle(_) => ("battle".to_owned(), DebugColor::Red),
                State::Search(s) => (
                    format!("search {}/{}", s.index, s.waypoints.len()),
                    DebugColor::Orange,
                ),
                State::Puppet(_) => ("puppet".to_owned(), DebugColor::Blue),
            };
            sink.text(body.position, &label, color);
            if let Some(look) = intent.look_at {
                sink.line(body.position, look, DebugColor::Yellow);
            }
            if let Some(movement) = movement {
                let mut previous = body.position;
                for &point in movement.path() {
                    sink.line(previous, point, DebugColor::Green);
                    previous = point;
                }
            }
        }
        for id in self.squads.ids() {
            if let Some(squad) = self.squads.get(id) {
                squad.aos.draw_debug(sink);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PATH_RETRY_DELAY;
    use crate::sandbox::Sandbox;

    fn open_level() -> LevelMap {
        LevelMap::from_ascii(&[
            "####################",
            "#..................#",
            "#..................#",
            "#..................#",
            "#..................#",
            "#..................#",
            "#..................#",
            "#..................#",
            "#..................#",
            "####################",
        ])
    }

    fn run(world: &mut AiWorld, sandbox: &mut Sandbox, level: &LevelMap, ticks: usize) -> Vec<AiEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            world.tick(sandbox, level);
            sandbox.step(world.clock().dt);
            events.extend(world.drain_events());
        }
        events
    }

    fn entered(events: &[AiEvent], agent: EntityId, kind: StateKind) -> bool {
        events
            .iter()
            .any(|e| matches!(e, AiEvent::StateChanged { agent: a, to, .. } if *a == agent && *to == kind))
    }

    #[test]
    fn test_damage_enters_battle_same_tick() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(16.5, 7.5), 0.3);
        sandbox.set_angle(drone, std::f32::consts::PI);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(3.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), IdleState::Point { home })
            .is_ok());
        assert!(world.notify_damage(drone, Some(target), None).is_ok());

        world.tick(&mut sandbox, &level);
        assert_eq!(world.state_kind(drone), Some(StateKind::Battle));
        assert!(world.squad_of(drone).is_some());
        let events = world.drain_events();
        assert!(entered(&events, drone, StateKind::Battle));
        assert!(events
            .iter()
            .any(|e| matches!(e, AiEvent::SquadFormed { target: Some(t), .. } if *t == target)));
    }

    #[test]
    fn test_sighting_builds_suspicion_into_battle() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 4.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(8.5, 4.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(3.5, 4.5);
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), IdleState::Point { home })
            .is_ok());
        world.set_hunted(Some(target));

        world.tick(&mut sandbox, &level);
        assert_eq!(world.state_kind(drone), Some(StateKind::Suspect));

        let events = run(&mut world, &mut sandbox, &level, 120);
        assert!(entered(&events, drone, StateKind::Battle));
        assert!(world.squad_of(drone).is_some());
    }

    #[test]
    fn test_unreachable_chase_hands_off_to_search_then_idle() {
        let level = LevelMap::from_ascii(&[
            "######################",
            "#..............#....#",
            "#..............#....#",
            "#..............#....#",
            "#..............#....#",
            "#..............#....#",
            "######################",
        ]);
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(2.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(18.5, 3.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(2.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), IdleState::Point { home })
            .is_ok());
        world.set_hunted(Some(target));
        assert!(world.set_battle_state(&sandbox, drone, Some(target)).is_ok());
        assert_eq!(world.state_kind(drone), Some(StateKind::Battle));

        let mut events = Vec::new();
        for _ in 0..60 {
            events.extend(run(&mut world, &mut sandbox, &level, 100));
            if entered(&events, drone, StateKind::Idle) {
                break;
            }
        }
        assert!(entered(&events, drone, StateKind::Search));
        assert!(events.iter().any(|e| matches!(e, AiEvent::SearchStarted { .. })));
        assert!(entered(&events, drone, StateKind::Idle));
        assert!(world.squads().is_empty());
    }

    #[test]
    fn test_immobile_drone_calls_for_help() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let turret = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let helper = sandbox.spawn_agent(Vec2::new(6.5, 3.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(3.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, turret, DroneParams::turret(), IdleState::Point { home })
            .is_ok());
        let home = Vec2::new(6.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, helper, DroneParams::default(), IdleState::Point { home })
            .is_ok());

        let origin = Vec2::new(10.5, 6.5);
        assert!(world.notify_damage(turret, None, Some(origin)).is_ok());
        world.tick(&mut sandbox, &level);

        assert_eq!(world.state_kind(turret), Some(StateKind::Suspect));
        match world.top_state(helper) {
            Some(State::Suspect(s)) => {
                assert_eq!(s.priority, SuspectPriority::HelpCall);
                assert_eq!(s.position, origin);
            }
            other => panic!("helper should answer the call, got {:?}", other),
        }
        let events = world.drain_events();
        assert!(events.iter().any(
            |e| matches!(e, AiEvent::HelpCall { responder: Some(r), .. } if *r == helper)
        ));
    }

    #[test]
    fn test_immobile_drone_shot_in_sight_calls_for_help() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let turret = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(7.5, 3.5), 0.3);
        sandbox.set_angle(turret, 0.0);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(3.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, turret, DroneParams::turret(), IdleState::Point { home })
            .is_ok());
        world.set_hunted(Some(target));
        assert!(world.notify_damage(turret, Some(target), None).is_ok());

        world.tick(&mut sandbox, &level);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(e, AiEvent::HelpCall { .. })));
        assert!(!entered(&events, turret, StateKind::Battle));
        assert!(!events.iter().any(|e| matches!(e, AiEvent::SquadFormed { .. })));
        match world.top_state(turret) {
            Some(State::Suspect(s)) => assert_eq!(s.target, Some(target)),
            other => panic!("turret should stay suspicious, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_home_retries_slowly() {
        let level = LevelMap::from_ascii(&[
            "####################",
            "#.........#........#",
            "#.........#........#",
            "#.........#........#",
            "#.........#........#",
            "####################",
        ]);
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 2.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(15.5, 2.5);
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), IdleState::Point { home })
            .is_ok());

        let ticks = 180;
        let events = run(&mut world, &mut sandbox, &level, ticks);
        assert!(events
            .iter()
            .any(|e| matches!(e, AiEvent::PathFailed { agent, .. } if *agent == drone)));
        let seconds = ticks as f32 * world.clock().dt;
        let bound = 2 + (seconds / PATH_RETRY_DELAY) as u64;
        assert!(world.paths.issued_count() <= bound);
        assert_eq!(world.state_kind(drone), Some(StateKind::Idle));
    }

    #[test]
    fn test_alarm_without_responders_escalates_everyone() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let a = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let b = sandbox.spawn_agent(Vec2::new(5.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(15.5, 6.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let camper = DroneParams {
            camper: true,
            ..DroneParams::default()
        };
        assert!(world
            .spawn_drone(&sandbox, a, camper.clone(), IdleState::Point { home: Vec2::new(3.5, 3.5) })
            .is_ok());
        assert!(world
            .spawn_drone(&sandbox, b, camper, IdleState::Point { home: Vec2::new(5.5, 3.5) })
            .is_ok());

        let responder = world.raise_alarm(&sandbox, &level, Vec2::new(8.5, 3.5), Some(target));
        assert_eq!(responder, None);
        assert_eq!(world.state_kind(a), Some(StateKind::Battle));
        assert_eq!(world.state_kind(b), Some(StateKind::Battle));
        assert_eq!(world.squad_of(a), world.squad_of(b));
        assert_eq!(world.squads().len(), 1);
    }

    #[test]
    fn test_no_target_disbands_and_idles() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let a = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let b = sandbox.spawn_agent(Vec2::new(3.5, 6.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(15.5, 5.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        for (agent, home) in [(a, Vec2::new(3.5, 3.5)), (b, Vec2::new(3.5, 6.5))] {
            assert!(world
                .spawn_drone(&sandbox, agent, DroneParams::default(), IdleState::Point { home })
                .is_ok());
            assert!(world.set_battle_state(&sandbox, agent, Some(target)).is_ok());
        }
        assert_eq!(world.squads().len(), 1);

        world.no_target(target);
        assert_eq!(world.state_kind(a), Some(StateKind::Idle));
        assert_eq!(world.state_kind(b), Some(StateKind::Idle));
        assert!(world.squads().is_empty());
        assert_eq!(world.squad_of(a), None);
    }

    #[test]
    fn test_vanished_target_is_dropped_by_squad_phase() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(15.5, 5.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let home = Vec2::new(3.5, 3.5);
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), IdleState::Point { home })
            .is_ok());
        assert!(world.set_battle_state(&sandbox, drone, Some(target)).is_ok());
        assert!(sandbox.despawn(target));

        world.tick(&mut sandbox, &level);
        assert_eq!(world.state_kind(drone), Some(StateKind::Idle));
        assert!(world.squads().is_empty());
    }

    #[test]
    fn test_proxy_inspect_picks_nearest_free_drone() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let near = sandbox.spawn_agent(Vec2::new(8.5, 3.5), 0.3);
        let far = sandbox.spawn_agent(Vec2::new(2.5, 3.5), 0.3);
        let camper = sandbox.spawn_agent(Vec2::new(10.5, 3.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        for agent in [near, far] {
            let home = Vec2::ZERO;
            assert!(world
                .spawn_drone(&sandbox, agent, DroneParams::default(), IdleState::Point { home })
                .is_ok());
        }
        let params = DroneParams {
            camper: true,
            ..DroneParams::default()
        };
        assert!(world
            .spawn_drone(&sandbox, camper, params, IdleState::Point { home: Vec2::ZERO })
            .is_ok());

        assert_eq!(world.proxy_inspect(&sandbox, Vec2::new(12.5, 3.5)), Some(near));
        assert_eq!(world.state_kind(near), Some(StateKind::Suspect));
        assert_eq!(world.state_kind(far), Some(StateKind::Idle));
    }

    #[test]
    fn test_registry_errors() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let stranger = sandbox.spawn_dynamic(Vec2::new(5.5, 3.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let idle = IdleState::Point { home: Vec2::ZERO };
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), idle.clone())
            .is_ok());
        assert!(matches!(
            world.spawn_drone(&sandbox, drone, DroneParams::default(), idle),
            Err(AiError::AlreadyRegistered(_))
        ));
        assert!(matches!(world.remove_state(stranger), Err(AiError::UnknownAgent(_))));
        assert!(matches!(world.describe(stranger), Err(AiError::UnknownAgent(_))));
    }

    #[test]
    fn test_puppet_requires_movement_to_move() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let turret = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let drone = sandbox.spawn_agent(Vec2::new(5.5, 5.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let idle = IdleState::Point { home: Vec2::ZERO };
        assert!(world
            .spawn_drone(&sandbox, turret, DroneParams::turret(), idle.clone())
            .is_ok());
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), idle)
            .is_ok());

        assert!(matches!(
            world.puppet_move(turret, Some(Vec2::ONE), SpeedClass::Walk, None),
            Err(AiError::NoMovement(_))
        ));
        assert!(world.puppet_move(turret, None, SpeedClass::Walk, Some(Vec2::ONE)).is_ok());
        assert_eq!(world.state_kind(turret), Some(StateKind::Puppet));

        let goal = Vec2::new(12.5, 5.5);
        assert!(world.puppet_move(drone, Some(goal), SpeedClass::Run, None).is_ok());
        run(&mut world, &mut sandbox, &level, 300);
        let position = sandbox.body(drone).map(|b| b.position);
        assert!(position.map_or(false, |p| p.distance(goal) < 1.0), "{:?}", position);
        assert_eq!(world.stack_len(drone), Some(2));
    }

    #[test]
    fn test_despawn_releases_squad() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(15.5, 5.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let idle = IdleState::Point { home: Vec2::ZERO };
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), idle)
            .is_ok());
        assert!(world.set_battle_state(&sandbox, drone, Some(target)).is_ok());
        assert!(world.despawn(drone).is_ok());
        assert!(world.squads().is_empty());
        assert!(!world.contains(drone));
    }

    #[test]
    fn test_sensor_drone_tracks_overlaps() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 4.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(6.5, 4.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let params = DroneParams {
            sensor: true,
            ..DroneParams::default()
        };
        let idle = IdleState::Point { home: Vec2::new(3.5, 4.5) };
        assert!(world.spawn_drone(&sandbox, drone, params, idle).is_ok());

        world.sync_sensors(&sandbox);
        world.tick(&mut sandbox, &level);
        assert!(matches!(
            world.reading(drone),
            Some(TargetReading::Visible { entity, .. }) if entity == target
        ));

        sandbox.set_position(target, Vec2::new(18.5, 8.5));
        world.sync_sensors(&sandbox);
        world.tick(&mut sandbox, &level);
        assert!(!world.reading(drone).map_or(false, |r| r.is_visible()));
    }

    #[test]
    fn test_activation_skips_dormant_drones() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);

        let config = AiConfig {
            active_radius: 5.0,
            ..AiConfig::default()
        };
        let mut world = AiWorld::new(config, &level);
        let idle = IdleState::Point { home: Vec2::ZERO };
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), idle)
            .is_ok());

        world.update_activation(&sandbox, Vec2::new(18.0, 8.0));
        assert!(!world.is_active(drone));
        assert!(world.notify_damage(drone, None, None).is_ok());
        world.tick(&mut sandbox, &level);
        assert_eq!(world.state_kind(drone), Some(StateKind::Idle));

        assert_eq!(world.update_activation(&sandbox, Vec2::new(4.0, 4.0)), vec![drone]);
        world.tick(&mut sandbox, &level);
        assert_eq!(world.state_kind(drone), Some(StateKind::Suspect));
    }

    #[test]
    fn test_describe_and_debug_draw() {
        let level = open_level();
        let mut sandbox = Sandbox::new(&level);
        let drone = sandbox.spawn_agent(Vec2::new(3.5, 3.5), 0.3);
        let target = sandbox.spawn_dynamic(Vec2::new(15.5, 5.5), 0.3);

        let mut world = AiWorld::new(AiConfig::default(), &level);
        let idle = IdleState::Point { home: Vec2::ZERO };
        assert!(world
            .spawn_drone(&sandbox, drone, DroneParams::default(), idle)
            .is_ok());
        assert!(world.set_battle_state(&sandbox, drone, Some(target)).is_ok());

        let text = world.describe(drone).unwrap_or_default();
        assert!(text.contains("Idle > Battle"), "{}", text);
        assert!(text.contains("active"));

        let mut sink = crate::debug::RecordingSink::new();
        world.draw_debug(&sandbox, &mut sink);
        assert!(sink.texts().any(|t| t == "battle"));
    }
}
