//! The tick driver and command surface (§4.7, §6): the single module
//! context struct that owns the agent registry, flock registry, and nav
//! service, wiring together every other module each tick.
//!
//! Grounded on the teacher's `simulation::SimulationPlugin` system
//! ordering (`systems_config.rs`: a fixed system-set sequence run every
//! `Time<Fixed>` step) and `control::commands.rs` (the move/attack/stop
//! command surface) — generalized here to a plain method-call API since
//! this crate has no bevy `App`/ECS schedule to host systems on.

use std::io::{Read, Write};

use rustc_hash::FxHashMap;

use crate::blockers;
use crate::clearpath::{self, ClearPathEnt};
use crate::config::Config;
use crate::error::MovementResult;
use crate::events::EventSink;
use crate::fixed_math::{FixedNum, FixedVec2};
use crate::flock::FlockRegistry;
use crate::ids::AgentId;
use crate::motion::{MotionKind, MotionState};
use crate::nav::NavService;
use crate::orientation;
use crate::spatial_hash::SpatialHash;
use crate::steering::{self, Neighbor};
use crate::world::World;

/// Which command the next left-click should issue, armed by
/// `SetMoveOnLeftClick`/`SetAttackOnLeftClick` (§6). Modeled on the
/// teacher's `control::resources::InputMode`, minus the `Selection`
/// click-drag bookkeeping, which stays in the out-of-scope UI layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClickIntent {
    #[default]
    Select,
    Move,
    Attack,
}

/// The movement engine: agent registry, flock registry, nav service, and
/// the per-tick neighbor index, all in one owned context struct (§9
/// "global mutable state" design note — no process-wide singleton).
pub struct MovementEngine<N: NavService> {
    config: Config,
    nav: N,
    agents: FxHashMap<AgentId, MotionState>,
    flocks: FlockRegistry,
    spatial: SpatialHash,
    click_intent: ClickIntent,
    tick: u64,
}

fn is_stationary(world: &dyn World, agent: AgentId) -> bool {
    world.is_stationary(agent) || world.max_speed(agent) == FixedNum::ZERO
}

impl<N: NavService> MovementEngine<N> {
    /// `Init(map) -> bool` (§6), generalized: construction never fails in
    /// this crate (the opaque nav service is handed in already built), so
    /// this is infallible where the original returned a success flag.
    pub fn new(config: Config, nav: N) -> Self {
        let spatial = SpatialHash::new(config.spatial_hash_cell_size);
        Self {
            config,
            nav,
            agents: FxHashMap::default(),
            flocks: FlockRegistry::new(),
            spatial,
            click_intent: ClickIntent::default(),
            tick: 0,
        }
    }

    /// `Shutdown()` (§6): a no-op kept for parity with callers ported
    /// from the original interface. Safe Rust tears the engine down via
    /// ordinary `Drop`; there is no explicit teardown step to run.
    pub fn shutdown(&mut self) {}

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn nav(&self) -> &N {
        &self.nav
    }

    pub fn nav_mut(&mut self) -> &mut N {
        &mut self.nav
    }

    pub fn motion_state(&self, agent: AgentId) -> Option<&MotionState> {
        self.agents.get(&agent)
    }

    pub fn flocks(&self) -> &FlockRegistry {
        &self.flocks
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// `SetMoveOnLeftClick` (§6): arms the next click as a move command.
    pub fn set_move_on_left_click(&mut self) {
        self.click_intent = ClickIntent::Move;
    }

    /// `SetAttackOnLeftClick` (§6): arms the next click as an attack
    /// command (treated identically to a move command by this engine —
    /// combat target selection is out of scope, §1).
    pub fn set_attack_on_left_click(&mut self) {
        self.click_intent = ClickIntent::Attack;
    }

    pub fn click_intent(&self) -> ClickIntent {
        self.click_intent
    }

    /// Consumes the armed click intent, resetting it to `Select`. The
    /// embedder's input handler calls this once it has dispatched the
    /// corresponding command.
    pub fn take_click_intent(&mut self) -> ClickIntent {
        std::mem::take(&mut self.click_intent)
    }

    /// `AddEntity(agent)` (§3 lifecycle, §6): creates a `MotionState` in
    /// `ARRIVED`, immediately claiming a blocker at the agent's current
    /// position.
    pub fn add_entity(&mut self, world: &dyn World, agent: AgentId) {
        if self.agents.contains_key(&agent) {
            return;
        }
        let pos = world.pos(agent);
        let radius = world.radius(agent);
        // `new_arrived` already marks the agent blocking at (pos, radius);
        // only the nav-service side of that claim still needs making.
        let ms = MotionState::new_arrived(pos, radius);
        self.nav.blockers_incref(agent, pos, radius);
        self.agents.insert(agent, ms);
    }

    /// `RemoveEntity(agent)` (§3 lifecycle, §6): releases the blocker (if
    /// still claimed) and flock membership, then drops the motion state.
    pub fn remove_entity(&mut self, agent: AgentId) {
        if let Some(mut ms) = self.agents.remove(&agent) {
            if ms.blocking {
                blockers::entity_unblock(&mut self.nav, agent, &mut ms);
            }
        }
        self.flocks.remove_from_flocks(agent);
    }

    /// `GetDest(agent) -> option<xz>` (§6): the target point of the
    /// agent's flock, if it belongs to one.
    pub fn get_dest(&self, agent: AgentId) -> Option<FixedVec2> {
        self.flocks.flock_for_agent(agent).map(|f| f.target_xz)
    }

    /// `UpdatePos(agent, xz)` (§6): records an externally-driven position
    /// change and, if the agent is currently a blocker, rewrites its
    /// footprint atomically at the new position (§4.6).
    pub fn update_pos(&mut self, agent: AgentId, new_pos: FixedVec2) {
        let Some(ms) = self.agents.get_mut(&agent) else {
            return;
        };
        if ms.blocking {
            let radius = ms.last_stop_radius;
            blockers::rewrite_footprint(&mut self.nav, agent, ms, new_pos, radius);
        }
    }

    /// `UpdateSelectionRadius(agent, r)` (§6): as `update_pos`, but for a
    /// radius change while still.
    pub fn update_selection_radius(&mut self, agent: AgentId, new_radius: FixedNum) {
        let Some(ms) = self.agents.get_mut(&agent) else {
            return;
        };
        if ms.blocking {
            let pos = ms.last_stop_pos;
            blockers::rewrite_footprint(&mut self.nav, agent, ms, pos, new_radius);
        }
    }

    /// `Stop(agent)` (§4.2 "any non-still -> ARRIVED"): explicitly
    /// detaches the agent from its flock (scenario 2, §8) in addition to
    /// running the generic still-transition side effects — unlike the
    /// tick-driven MOVING -> ARRIVED transition on natural arrival, which
    /// leaves flock membership alone so the flock can disband once every
    /// member has arrived (§3 invariant).
    pub fn stop(&mut self, world: &dyn World, events: &mut dyn EventSink, agent: AgentId) {
        let Some(ms) = self.agents.get_mut(&agent) else {
            return;
        };
        if !ms.is_still() {
            transition_to_arrived(&self.config, &mut self.nav, world, events, agent, ms);
        }
        self.flocks.remove_agent_from_its_flock(agent);
    }

    /// `SetSeekEnemies(agent)` (§4.2 "ARRIVED -> SEEK_ENEMIES"):
    /// releases the blocker, emits `MOTION_START`, and leaves any flock.
    /// A no-op for stationary agents (§4.1: they never participate in
    /// flocks or steering).
    pub fn set_seek_enemies(&mut self, world: &dyn World, agent: AgentId, events: &mut dyn EventSink) {
        if is_stationary(world, agent) {
            return;
        }
        let Some(ms) = self.agents.get_mut(&agent) else {
            return;
        };
        if ms.blocking {
            blockers::entity_unblock(&mut self.nav, agent, ms);
        }
        ms.state = MotionKind::SeekEnemies;
        ms.velocity = FixedVec2::ZERO;
        events.on_motion_start(agent);
        self.flocks.remove_agent_from_its_flock(agent);
    }

    /// `SetDest(agent, xz)` (§6): `make_flock` (§4.1) applied to a single
    /// agent — equivalent to `make_flock_from_selection(&[agent], xz)`.
    pub fn set_dest(
        &mut self,
        world: &dyn World,
        events: &mut dyn EventSink,
        agent: AgentId,
        target: FixedVec2,
    ) {
        self.make_flock_from_selection(world, events, &[agent], target);
    }

    /// `make_flock(selection, target)` (§4.1): snaps `target` to the
    /// closest reachable destination from the *first* selection member
    /// (§9 documented approximation), removes every non-stationary
    /// selected agent from its current flock, transitions each to
    /// `MOVING`, and merges them into the flock for the resulting
    /// `dest_id` (creating one if none exists yet).
    ///
    /// Stationary agents in `selection` are silently skipped (§4.1); a
    /// selection containing only stationary agents creates no flock
    /// (§8 law).
    pub fn make_flock_from_selection(
        &mut self,
        world: &dyn World,
        events: &mut dyn EventSink,
        selection: &[AgentId],
        target: FixedVec2,
    ) -> Option<usize> {
        let movable: Vec<AgentId> = selection
            .iter()
            .copied()
            .filter(|&a| self.agents.contains_key(&a) && !is_stationary(world, a))
            .collect();
        if movable.is_empty() {
            return None;
        }

        let anchor_pos = world.pos(movable[0]);
        let snapped = self.nav.closest_reachable_dest(anchor_pos, target);
        let dest_id = self.nav.dest_id_for_pos(snapped);

        for &agent in &movable {
            self.flocks.remove_from_flocks(agent);
            let ms = self.agents.get_mut(&agent).expect("checked contains_key above");
            if ms.blocking {
                blockers::entity_unblock(&mut self.nav, agent, ms);
            }
            let was_still = ms.is_still();
            ms.state = MotionKind::Moving;
            if was_still {
                events.on_motion_start(agent);
            }
        }

        Some(self.flocks.make_or_merge(movable, snapped, dest_id))
    }

    /// `SaveState(stream)` (§6): writes every flock (member count,
    /// members, target, dest id) followed by every agent (id + every
    /// `MotionState` field except the unserialized blocker footprint).
    pub fn save_state<W: Write>(&self, writer: &mut W) -> MovementResult<()> {
        bincode::serialize_into(&mut *writer, &self.flocks)?;
        let agents: Vec<(AgentId, MotionState)> = self
            .agents
            .iter()
            .map(|(&id, ms)| (id, ms.clone()))
            .collect();
        bincode::serialize_into(&mut *writer, &agents)?;
        Ok(())
    }

    /// `LoadState(stream)` (§6): replaces the flock and agent registries
    /// from `reader`. `last_stop_pos`/`last_stop_radius` are not
    /// serialized; the loader reconciles `blocking` against each agent's
    /// *current* position/radius in `world` — re-incref'ing a blocker
    /// footprint there when the loaded state says `blocking`, or
    /// releasing whatever the in-memory default assumed otherwise, so
    /// the persisted flag (not the freshly-constructed default) is
    /// authoritative after load. On any deserialization failure the load
    /// is aborted with `Err` and the engine's prior state is left
    /// untouched (§7).
    pub fn load_state<R: Read>(&mut self, world: &dyn World, reader: &mut R) -> MovementResult<()> {
        let flocks: FlockRegistry = bincode::deserialize_from(&mut *reader)?;
        let loaded_agents: Vec<(AgentId, MotionState)> = bincode::deserialize_from(&mut *reader)?;

        // Release every blocker this engine currently holds before
        // adopting the loaded state, so a failed sanity check below never
        // leaves two live blockers for the same agent.
        for (&agent, ms) in self.agents.iter_mut() {
            if ms.blocking {
                self.nav.blockers_decref(agent, ms.last_stop_pos, ms.last_stop_radius);
            }
        }

        let mut new_agents = FxHashMap::default();
        for (agent, mut ms) in loaded_agents {
            let pos = world.pos(agent);
            let radius = world.radius(agent);
            if ms.blocking {
                self.nav.blockers_incref(agent, pos, radius);
                ms.last_stop_pos = pos;
                ms.last_stop_radius = radius;
            } else {
                ms.last_stop_pos = pos;
                ms.last_stop_radius = radius;
            }
            new_agents.insert(agent, ms);
        }

        self.agents = new_agents;
        self.flocks = flocks;
        Ok(())
    }

    /// The 20 Hz tick driver (§4.7): disbands fully-arrived flocks, then
    /// runs the two-pass steering/ClearPath -> integration/state-machine
    /// split so that every agent's collision avoidance this tick observes
    /// the same pre-tick snapshot of its peers. A third, narrower pass
    /// drives the WAITING countdown (DESIGN.md: §4.2's "still" agents
    /// still need a per-tick transition check, unlike ARRIVED).
    #[skirmish_movement_macros::profile(5)]
    pub fn tick(&mut self, world: &mut dyn World, events: &mut dyn EventSink) {
        self.tick += 1;

        crate::profile_log!(
            self.tick,
            "[SIM STATUS] tick: {} | agents: {} | flocks: {}",
            self.tick,
            self.agents.len(),
            self.flocks.len()
        );

        self.flocks.disband_arrived(|agent| {
            self.agents
                .get(&agent)
                .map(|ms| ms.state == MotionKind::Arrived)
                .unwrap_or(true)
        });

        self.spatial.rebuild(
            self.agents
                .keys()
                .copied()
                .filter(|&a| !is_stationary(world, a))
                .map(|a| (a, world.pos(a))),
        );

        let active: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, ms)| !ms.is_still())
            .map(|(&a, _)| a)
            .collect();

        // WAITING agents are "still" (§4.2) so they're excluded from
        // steering/ClearPath below, but their resume countdown (§4.2
        // WAITING -> wait_prev) must still tick every frame — only
        // ARRIVED has no spontaneous per-tick transition to drive. This
        // snapshot is taken *before* pass 2 runs, so an agent that only
        // becomes WAITING during this tick's pass 2 (MOVING/SEEK_ENEMIES
        // -> WAITING via `run_state_machine`) is excluded here and gets
        // its freshly-set `wait_ticks_left` counted down for the first
        // time on the *next* tick, not decremented a second time this
        // same tick.
        let already_waiting: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, ms)| ms.state == MotionKind::Waiting)
            .map(|(&a, _)| a)
            .collect();

        // Pass 1: steering + ClearPath, reading only the pre-tick
        // snapshot (world positions/velocities as of tick start).
        let mut pending: Vec<(AgentId, FixedVec2)> = Vec::with_capacity(active.len());
        for &agent in &active {
            let vnew = self.steer_and_avoid(world, agent);
            pending.push((agent, vnew));
        }

        // Pass 2: integrate + run the state machine. No read in this pass
        // observes another agent's pass-2 update from this same tick.
        for (agent, vnew) in pending {
            self.entity_update(world, events, agent, vnew);
        }

        for agent in already_waiting {
            self.run_state_machine(world, events, agent);
        }
    }

    /// Pass 1 body for one agent: nav query -> steering blend ->
    /// ClearPath, returning the candidate `vnew` for pass 2 to integrate.
    fn steer_and_avoid(&mut self, world: &dyn World, agent: AgentId) -> FixedVec2 {
        let pos = world.pos(agent);
        let radius = world.radius(agent);
        let max_speed = world.max_speed(agent);
        let velocity = self.agents[&agent].velocity;

        let (vdes, vpref) = match self.agents[&agent].state {
            MotionKind::Moving => {
                let flock = self
                    .flocks
                    .flock_for_agent(agent)
                    .expect("MOVING agent must belong to a flock (§3 invariant)");
                let dest_id = flock.dest_id;
                let target = flock.target_xz;
                let vdes = self.nav.desired_point_seek_velocity(dest_id, pos, target);

                let peers = self.collect_flock_peers(world, agent, pos);
                let separation = self.collect_separation_neighbors(world, agent, pos, radius);

                let (force, _tier) = steering::point_seek_steer_force(
                    &self.config,
                    &self.nav,
                    dest_id,
                    pos,
                    target,
                    velocity,
                    vdes,
                    max_speed,
                    radius,
                    &peers,
                    &separation,
                );
                let step = crate::fixed_math::vec2_truncate(
                    velocity + force / self.config.mass,
                    max_speed / self.config.tick_rate,
                );
                (vdes, step)
            }
            MotionKind::SeekEnemies => {
                let faction = world.faction(agent);
                let vdes = self.nav.desired_enemy_seek_velocity(pos, faction);
                let separation = self.collect_separation_neighbors(world, agent, pos, radius);

                let (force, _tier) = steering::enemy_seek_steer_force(
                    &self.config,
                    &self.nav,
                    pos,
                    pos,
                    velocity,
                    vdes,
                    max_speed,
                    radius,
                    &separation,
                );
                let step = crate::fixed_math::vec2_truncate(
                    velocity + force / self.config.mass,
                    max_speed / self.config.tick_rate,
                );
                (vdes, step)
            }
            MotionKind::Arrived | MotionKind::Waiting => unreachable!("still agents are filtered out of pass 1"),
        };

        let clearpath_neighbors = self.collect_clearpath_neighbors(world, agent, pos);
        let vnew = clearpath::clearpath_new_velocity(
            pos,
            velocity,
            radius,
            vpref,
            &clearpath_neighbors.0,
            &clearpath_neighbors.1,
        );

        let ms = self.agents.get_mut(&agent).expect("agent present");
        ms.vdes = vdes;
        // `velocity + (vnew - velocity)` (§4.4, §9): algebraically `vnew`;
        // kept as a direct assignment rather than the round-trip
        // subtraction the original performs, since the arithmetic is
        // provably a no-op.
        ms.vnew = vnew;
        ms.push_vel_hist(vnew);
        vnew
    }

    fn collect_flock_peers(&self, world: &dyn World, agent: AgentId, pos: FixedVec2) -> smallvec::SmallVec<[Neighbor; 8]> {
        let Some(flock) = self.flocks.flock_for_agent(agent) else {
            return smallvec::SmallVec::new();
        };
        let ids = self
            .spatial
            .query_radius(pos, self.config.cohesion_neighbour_radius, Some(agent));
        ids.into_iter()
            .filter(|id| flock.contains(*id))
            .map(|id| self.neighbor_of(world, id))
            .collect()
    }

    fn collect_separation_neighbors(
        &self,
        world: &dyn World,
        agent: AgentId,
        pos: FixedVec2,
        _self_radius: FixedNum,
    ) -> smallvec::SmallVec<[Neighbor; 8]> {
        let ids = self
            .spatial
            .query_radius(pos, self.config.separation_neighbour_radius, Some(agent));
        ids.into_iter()
            .filter(|&id| !is_stationary(world, id))
            .map(|id| self.neighbor_of(world, id))
            .collect()
    }

    fn collect_clearpath_neighbors(
        &self,
        world: &dyn World,
        agent: AgentId,
        pos: FixedVec2,
    ) -> (Vec<ClearPathEnt>, Vec<ClearPathEnt>) {
        let ids = self
            .spatial
            .query_radius(pos, self.config.clearpath_neighbour_radius, Some(agent));
        let mut dynamic = Vec::new();
        let mut stationary = Vec::new();
        for id in ids {
            if is_stationary(world, id) {
                continue;
            }
            let Some(other_ms) = self.agents.get(&id) else {
                continue;
            };
            let ent = ClearPathEnt {
                id,
                pos: world.pos(id),
                velocity: other_ms.velocity,
                radius: world.radius(id),
            };
            if other_ms.is_still() {
                stationary.push(ent);
            } else {
                dynamic.push(ent);
            }
        }
        (dynamic, stationary)
    }

    fn neighbor_of(&self, world: &dyn World, id: AgentId) -> Neighbor {
        Neighbor {
            id,
            pos: world.pos(id),
            velocity: self.agents.get(&id).map(|ms| ms.velocity).unwrap_or(FixedVec2::ZERO),
            radius: world.radius(id),
        }
    }

    /// Pass 2 body for one agent (`entity_update`, §4.7): integrate
    /// position, update orientation, then run the per-agent state
    /// machine transitions (§4.2).
    fn entity_update(&mut self, world: &mut dyn World, events: &mut dyn EventSink, agent: AgentId, vnew: FixedVec2) {
        let pos = world.pos(agent);
        let candidate_pos = pos + vnew;
        let pathable = vnew.length() > FixedNum::ZERO && self.nav.position_pathable(candidate_pos);

        if pathable {
            let height = self.nav.height_at_point(candidate_pos);
            let _ = height; // vertical follows terrain; embedder applies it via set_pos's companion transform.
            world.set_pos(agent, candidate_pos);
            if let Some(ms) = self.agents.get_mut(&agent) {
                ms.velocity = vnew;
            }
        } else if let Some(ms) = self.agents.get_mut(&agent) {
            ms.velocity = FixedVec2::ZERO;
        }

        if let Some(ms) = self.agents.get(&agent) {
            let mut orientation = glam::Quat::IDENTITY;
            orientation::update_orientation(&mut orientation, &ms.vel_hist, self.config.epsilon);
            world.set_orientation(agent, orientation);
        }

        self.run_state_machine(world, events, agent);
    }

    /// The per-agent state machine (§4.2), applied after integration.
    fn run_state_machine(&mut self, world: &dyn World, events: &mut dyn EventSink, agent: AgentId) {
        let Some(state) = self.agents.get(&agent).map(|ms| ms.state) else {
            return;
        };

        match state {
            MotionKind::Moving => {
                let vdes_len = self.agents[&agent].vdes.length();
                if vdes_len < self.config.epsilon {
                    let ms = self.agents.get_mut(&agent).expect("agent present");
                    transition_to_waiting(&self.config, &mut self.nav, world, events, agent, ms, MotionKind::Moving);
                    return;
                }
                if self.has_arrived(world, agent) {
                    let ms = self.agents.get_mut(&agent).expect("agent present");
                    transition_to_arrived(&self.config, &mut self.nav, world, events, agent, ms);
                }
            }
            MotionKind::SeekEnemies => {
                let vdes_len = self.agents[&agent].vdes.length();
                if vdes_len < self.config.epsilon {
                    let ms = self.agents.get_mut(&agent).expect("agent present");
                    transition_to_waiting(&self.config, &mut self.nav, world, events, agent, ms, MotionKind::SeekEnemies);
                }
            }
            MotionKind::Waiting => {
                let done = {
                    let ms = self.agents.get_mut(&agent).expect("agent present");
                    debug_assert!(ms.wait_ticks_left > 0, "WAITING agent with no countdown remaining");
                    ms.wait_ticks_left -= 1;
                    ms.wait_ticks_left == 0
                };
                if done {
                    let resume_to = self.agents[&agent].wait_prev;
                    let ms = self.agents.get_mut(&agent).expect("agent present");
                    blockers::entity_unblock(&mut self.nav, agent, ms);
                    ms.state = resume_to;
                    events.on_motion_start(agent);
                }
            }
            MotionKind::Arrived => {}
        }
    }

    /// MOVING -> ARRIVED guard (§4.2): within arrival radius of the
    /// flock's target, the nav service reports the agent maximally
    /// close, or any adjacent flock peer has already arrived.
    fn has_arrived(&self, world: &dyn World, agent: AgentId) -> bool {
        let Some(flock) = self.flocks.flock_for_agent(agent) else {
            return false;
        };
        let pos = world.pos(agent);
        let radius = world.radius(agent);
        let arrival_radius = radius * FixedNum::from_num(1.5);

        if pos.distance(flock.target_xz) <= arrival_radius {
            return true;
        }
        if self.nav.is_maximally_close(flock.dest_id, pos) {
            return true;
        }

        flock.members.iter().any(|&peer| {
            if peer == agent {
                return false;
            }
            let Some(peer_ms) = self.agents.get(&peer) else {
                return false;
            };
            if peer_ms.state != MotionKind::Arrived {
                return false;
            }
            let peer_pos = world.pos(peer);
            let peer_radius = world.radius(peer);
            pos.distance(peer_pos) <= radius + peer_radius + self.config.adjacency_sep_dist
        })
    }
}

/// Shared ARRIVED-transition side effects (§4.2): emit `MOTION_END`, zero
/// velocity, claim the blocker, and set an aggressive stance if the
/// agent can hold one. Used by the tick-driven MOVING -> ARRIVED
/// transition and by the `Stop`/`RemoveEntity` command paths.
fn transition_to_arrived<N: NavService>(
    _cfg: &Config,
    nav: &mut N,
    world: &dyn World,
    events: &mut dyn EventSink,
    agent: AgentId,
    ms: &mut MotionState,
) {
    let was_still = ms.is_still();
    ms.state = MotionKind::Arrived;
    ms.velocity = FixedVec2::ZERO;
    if !ms.blocking {
        let pos = world.pos(agent);
        let radius = world.radius(agent);
        blockers::entity_block(nav, agent, ms, pos, radius);
    }
    if !was_still {
        events.on_motion_end(agent);
        if world.is_combat_capable(agent) {
            events.on_set_aggressive_stance(agent);
        }
    }
}

/// Shared WAITING-transition side effects (§4.2): identical to
/// [`transition_to_arrived`]'s still-claiming side effects, plus
/// recording `wait_prev`/`wait_ticks_left` so the agent resumes the
/// state it was waiting from.
fn transition_to_waiting<N: NavService>(
    cfg: &Config,
    nav: &mut N,
    world: &dyn World,
    events: &mut dyn EventSink,
    agent: AgentId,
    ms: &mut MotionState,
    from: MotionKind,
) {
    let was_still = ms.is_still();
    ms.wait_prev = from;
    ms.wait_ticks_left = cfg.wait_ticks;
    ms.state = MotionKind::Waiting;
    ms.velocity = FixedVec2::ZERO;
    if !ms.blocking {
        let pos = world.pos(agent);
        let radius = world.radius(agent);
        blockers::entity_block(nav, agent, ms, pos, radius);
    }
    if !was_still {
        events.on_motion_end(agent);
    }
}
