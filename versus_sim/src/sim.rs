// Core simulation state and tick loop.
//
// `SimState` is the single source of truth for the contested city. It owns
// the block grid, every agent, placed mines and dropped pickups, both
// faction directors, the population and capacity ledgers, the event queue,
// the PRNG and the config. The sim is a pure function:
// `(state, commands) -> (new_state, narrative events)`.
//
// ## Scheduling
//
// Three recurring event chains drive everything (see `event.rs`):
//
// - `AgentDecision` per agent, every `decision_interval × U(0.9, 1.1)`
//   (jitter drawn once per agent). Runs the state machine in
//   `behavior.rs`. A destroyed agent's pending decision finds nothing when it
//   fires and is not rescheduled; that is the whole cancellation story.
// - `Frame` every `frame_interval_ticks`: movement and rotation for every
//   agent regardless of decision phase, health recharge, spatial
//   containment (an agent whose footprint changes block is moved between
//   rosters) and mine triggers.
// - `BlockRefresh` per block, every `influence_update_interval_secs`:
//   recompute dominance, move capacity in the ledger on a flip, and let the
//   directors re-rate the block when anything happened there. A flip also
//   has them re-rate the block's occupied 4-neighbors.
//
// ## Ledgers
//
// `population[f]` counts live agents. `max_faction_size[f]` is the sum of
// `faction_members_supported` over blocks whose refreshed dominance is `f`;
// every block contributes to exactly one faction (Neutral included), so the
// three entries always add up to the city's total capacity. An agent looking
// for refuge gives up when its faction's population exceeds its capacity.
//
// ## Destruction ordering
//
// Destroying an agent removes it from its home roster first, then the
// population ledger, then the agent table, and only then announces it. No
// roster scan after that point can see the agent.
//
// See also: `behavior.rs` for the agent state machine, `event.rs` for the
// queue, `command.rs` for `SimCommand`, `config.rs` for `GameConfig`,
// `grid.rs` and `block.rs` for the city, `director.rs` for priorities.
//
// **Critical constraint: determinism.** All state mutations flow through
// `SimCommand` or internal scheduled events, all randomness through
// `self.rng`, and all entity tables are `BTreeMap`s.

use crate::agent::Agent;
use crate::command::{SimAction, SimCommand};
use crate::config::GameConfig;
use crate::director::Director;
use crate::error::{SimError, SimResult};
use crate::event::{EventQueue, ScheduledEventKind, VersusEvent, VersusEventKind};
use crate::grid::City;
use crate::block::Block;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use versus_prng::GameRng;

/// A placed repellent mine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mine {
    pub id: MineId,
    pub position: WorldPos,
    /// The faction this mine is meant for.
    pub repels: Faction,
    pub placed_by: AgentId,
}

/// A dropped repellent ammo pickup for the FPS player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pickup {
    pub id: PickupId,
    pub position: WorldPos,
    /// Index into `RepellentConfig::pickup_costs`.
    pub kind: usize,
    pub block: BlockCoord,
}

/// The human player while in FPS mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub block: BlockCoord,
    pub position: WorldPos,
}

/// Top-level simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    /// Current simulation tick.
    pub tick: u64,

    /// The simulation's deterministic PRNG.
    pub rng: GameRng,

    /// Game configuration (immutable after initialization).
    pub config: GameConfig,

    /// The event priority queue driving the discrete event simulation.
    pub event_queue: EventQueue,

    /// The block grid.
    pub city: City,

    /// Every live agent, keyed by ID.
    pub agents: BTreeMap<AgentId, Agent>,

    pub mines: BTreeMap<MineId, Mine>,

    pub pickups: BTreeMap<PickupId, Pickup>,

    /// One director per playable faction.
    pub directors: BTreeMap<Faction, Director>,

    /// The FPS player, if one is in the city.
    pub player: Option<Player>,

    /// Live agents per faction, indexed by `Faction::index`.
    population: [u32; 3],
    /// Capacity per faction, indexed by `Faction::index`.
    max_faction_size: [i64; 3],

    next_agent_id: u32,
    next_mine_id: u32,
    next_pickup_id: u32,
    /// Per-faction counters for display names ("Cat 12").
    next_name_number: [u32; 3],
}

/// The result of processing commands and advancing the simulation.
pub struct StepResult {
    /// Narrative events emitted during this step, for the UI / event log.
    pub events: Vec<VersusEvent>,
}

impl SimState {
    /// Create a new simulation with default config and the given seed.
    pub fn new(seed: u64) -> SimResult<Self> {
        Self::with_config(seed, GameConfig::default())
    }

    /// Create a new simulation with the given seed and config. Generates
    /// the city, seeds it with animals if configured to, and schedules the
    /// recurring frame and block refreshes.
    pub fn with_config(seed: u64, config: GameConfig) -> SimResult<Self> {
        config.validate()?;
        let rng = GameRng::new(seed);
        let city = City::generate(&config.city);

        let mut directors = BTreeMap::new();
        for faction in [Faction::Cat, Faction::Dog] {
            directors.insert(faction, Director::new(faction, &city)?);
        }

        let mut state = Self {
            tick: 0,
            rng,
            config,
            event_queue: EventQueue::new(),
            city,
            agents: BTreeMap::new(),
            mines: BTreeMap::new(),
            pickups: BTreeMap::new(),
            directors,
            player: None,
            population: [0; 3],
            max_faction_size: [0; 3],
            next_agent_id: 0,
            next_mine_id: 0,
            next_pickup_id: 0,
            next_name_number: [0; 3],
        };

        for block in state.city.blocks() {
            state.max_faction_size[block.dominant_faction().index()] +=
                i64::from(block.faction_members_supported());
        }

        if state.config.city.populate {
            state.populate_city()?;
        }

        for coord in state.city.coords() {
            state
                .event_queue
                .schedule(0, ScheduledEventKind::BlockRefresh { coord });
        }
        state
            .event_queue
            .schedule(state.config.frame_interval_ticks, ScheduledEventKind::Frame);

        tracing::debug!(
            seed,
            blocks = state.city.blocks().count(),
            cats = state.population(Faction::Cat),
            dogs = state.population(Faction::Dog),
            "city generated"
        );
        Ok(state)
    }

    /// Seed every block with animals, cats weighted toward `(0, 0)` and dogs
    /// toward the far corner.
    fn populate_city(&mut self) -> SimResult<()> {
        let width = self.city.width();
        let depth = self.city.depth();
        let scale = self.config.city.seed_population_scale;
        let mut discarded = Vec::new();

        for coord in self.city.coords() {
            let cat_weight =
                ((width - coord.x) + (depth - coord.y)) as f32 / (width + depth) as f32;
            let dog_weight = 1.0 - cat_weight;

            let cats = self
                .rng
                .range_usize(0, (scale * cat_weight).round().max(0.0) as usize);
            for _ in 0..cats {
                self.spawn_agent(Faction::Cat, coord, &mut discarded)?;
            }
            let dogs = self
                .rng
                .range_usize(0, (scale * dog_weight).round().max(0.0) as usize);
            for _ in 0..dogs {
                self.spawn_agent(Faction::Dog, coord, &mut discarded)?;
            }
        }
        Ok(())
    }

    /// Apply a batch of commands and advance the sim to `target_tick`,
    /// interleaving them with scheduled events by tick.
    ///
    /// The batch need not be sorted; commands sharing a tick apply in batch
    /// order. A command stamped before the current tick applies at once,
    /// and one stamped after `target_tick` is dropped with a warning.
    pub fn step(&mut self, commands: &[SimCommand], target_tick: u64) -> StepResult {
        let mut events = Vec::new();
        let mut pending: Vec<&SimCommand> = commands
            .iter()
            .filter(|cmd| {
                let in_window = cmd.tick <= target_tick;
                if !in_window {
                    tracing::warn!(tick = cmd.tick, target_tick, "command past step target dropped");
                }
                in_window
            })
            .collect();
        pending.sort_by_key(|cmd| cmd.tick);
        let mut pending = pending.into_iter().peekable();

        loop {
            let next_cmd = pending.peek().map(|cmd| cmd.tick.max(self.tick));
            let next_event = self.event_queue.peek_tick().filter(|&t| t <= target_tick);
            let Some(now) = next_cmd.into_iter().chain(next_event).min() else {
                break;
            };
            self.tick = now.max(self.tick);

            while let Some(cmd) = pending.next_if(|cmd| cmd.tick <= self.tick) {
                self.apply_command(cmd, &mut events);
            }
            while let Some(event) = self.event_queue.pop_if_ready(self.tick) {
                self.process_event(event.kind, &mut events);
            }
        }

        self.tick = self.tick.max(target_tick);
        StepResult { events }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn apply_command(&mut self, cmd: &SimCommand, events: &mut Vec<VersusEvent>) {
        match &cmd.action {
            SimAction::SetPriority {
                coord,
                faction,
                priority,
            } => {
                if let Err(err) = self.override_priority(*coord, *faction, *priority, events) {
                    tracing::warn!(%coord, %faction, %priority, %err, "priority override dropped");
                }
            }
            SimAction::CyclePriority { coord, faction } => {
                let next = self.get_priority(*coord, *faction).map(Priority::cycled);
                let result =
                    next.and_then(|p| self.override_priority(*coord, *faction, p, events));
                if let Err(err) = result {
                    tracing::warn!(%coord, %faction, %err, "priority cycle dropped");
                }
            }
            SimAction::SpawnAgent { faction, coord } => {
                if let Err(err) = self.spawn_agent(*faction, *coord, events) {
                    tracing::warn!(%coord, %faction, %err, "spawn request dropped");
                }
            }
            SimAction::DamageAgent { agent_id, amount } => {
                if self.agents.contains_key(agent_id) {
                    self.damage_agent(*agent_id, *amount, events);
                } else {
                    tracing::warn!(agent = %agent_id, "damage for unknown agent dropped");
                }
            }
            SimAction::PlayerEnterBlock { coord, position } => {
                if self.city.block(*coord).is_none() {
                    tracing::warn!(%coord, "player cannot enter a missing block");
                    return;
                }
                self.move_player_presence(*coord);
                self.player = Some(Player {
                    block: *coord,
                    position: *position,
                });
            }
            SimAction::PlayerMove { position } => {
                let Some(mut player) = self.player else {
                    tracing::warn!("player move without a player in the city");
                    return;
                };
                player.position = *position;
                match self.city.block_at_position(*position) {
                    Some(coord) if coord != player.block => {
                        self.move_player_presence(coord);
                        player.block = coord;
                    }
                    _ => {}
                }
                self.player = Some(player);
            }
            SimAction::PlayerExitBlock => {
                if let Some(block) = self
                    .player
                    .take()
                    .and_then(|player| self.city.block_mut(player.block))
                {
                    block.player_present = false;
                }
            }
        }
    }

    /// Clear the player flag on the old block and set it on `coord`.
    fn move_player_presence(&mut self, coord: BlockCoord) {
        if let Some(block) = self
            .player
            .and_then(|previous| self.city.block_mut(previous.block))
        {
            block.player_present = false;
        }
        if let Some(block) = self.city.block_mut(coord) {
            block.player_present = true;
        }
    }

    /// A player priority override, routed through the faction's director.
    fn override_priority(
        &mut self,
        coord: BlockCoord,
        faction: Faction,
        priority: Priority,
        events: &mut Vec<VersusEvent>,
    ) -> SimResult<()> {
        if self.set_priority(coord, faction, priority)? {
            let description = match self.city.block(coord) {
                Some(block) => format!("The {faction}s were ordered to treat {block} as {priority} priority."),
                None => return Ok(()),
            };
            self.emit(
                events,
                Importance::Low,
                VersusEventKind::BlockUpdated { coord },
                description,
            );
        } else {
            tracing::warn!(
                %coord,
                %faction,
                max = self.config.director.max_high_priority,
                "High priority budget exhausted; override rejected"
            );
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------------

    pub fn get_priority(&self, coord: BlockCoord, faction: Faction) -> SimResult<Priority> {
        let faction = faction.require_playable()?;
        Ok(self.city.require_block(coord)?.priority(faction))
    }

    /// Override a block's priority for a faction. Returns `Ok(false)` when
    /// the faction's director has no High slot left.
    pub fn set_priority(
        &mut self,
        coord: BlockCoord,
        faction: Faction,
        priority: Priority,
    ) -> SimResult<bool> {
        let faction = faction.require_playable()?;
        let block = self.city.block_mut(coord).ok_or(SimError::BlockOutOfBounds {
            x: coord.x,
            y: coord.y,
        })?;
        let director = self
            .directors
            .get_mut(&faction)
            .ok_or(SimError::UnsupportedFaction(faction))?;
        Ok(director.request_priority(block, priority, &self.config.director))
    }

    /// Live agents of a faction.
    pub fn population(&self, faction: Faction) -> u32 {
        self.population[faction.index()]
    }

    /// Capacity currently supported by the blocks a faction dominates.
    pub fn max_faction_size(&self, faction: Faction) -> i64 {
        self.max_faction_size[faction.index()]
    }

    pub fn block(&self, coord: BlockCoord) -> Option<&Block> {
        self.city.block(coord)
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&Agent> {
        self.agents.get(&agent_id)
    }

    pub fn director(&self, faction: Faction) -> Option<&Director> {
        self.directors.get(&faction)
    }

    // -----------------------------------------------------------------------
    // Scheduled events
    // -----------------------------------------------------------------------

    fn process_event(&mut self, kind: ScheduledEventKind, events: &mut Vec<VersusEvent>) {
        match kind {
            ScheduledEventKind::AgentDecision { agent_id } => {
                self.process_agent_decision(agent_id, events);
            }
            ScheduledEventKind::Frame => {
                self.process_frame(events);
                let next_tick = self.tick + self.config.frame_interval_ticks;
                self.event_queue.schedule(next_tick, ScheduledEventKind::Frame);
            }
            ScheduledEventKind::BlockRefresh { coord } => {
                self.process_block_refresh(coord, events);
            }
            ScheduledEventKind::PickupExpired { pickup_id } => {
                self.pickups.remove(&pickup_id);
            }
        }
    }

    /// Movement, recharge, containment and mines for one frame.
    fn process_frame(&mut self, events: &mut Vec<VersusEvent>) {
        let dt = self.config.ticks_to_secs(self.config.frame_interval_ticks);
        let now = self.tick;
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();

        for id in ids {
            let Some(agent) = self.agents.get_mut(&id) else {
                continue;
            };
            let Some(data) = self.config.factions.get(&agent.faction) else {
                continue;
            };
            agent.advance(data, dt);
            agent.health.recharge(now, dt);

            // Chasing does not change home; everything else that walks
            // into another block's footprint now lives there.
            if agent.state == AgentState::Attack {
                continue;
            }
            let home = agent.home_block;
            match self.city.block_at_position(agent.position) {
                Some(coord) if coord != home => self.move_home(id, home, coord, events),
                _ => {}
            }
        }

        self.check_mines(events);
    }

    /// Detonate any mine an enemy has walked onto.
    fn check_mines(&mut self, events: &mut Vec<VersusEvent>) {
        let trigger_sqr = self.config.repellent.trigger_radius.powi(2);
        let blast_sqr = self.config.repellent.blast_radius.powi(2);
        let damage = self.config.repellent.mine_damage;
        let mine_ids: Vec<MineId> = self.mines.keys().copied().collect();

        for mine_id in mine_ids {
            let Some(mine) = self.mines.get(&mine_id) else {
                continue;
            };
            let (position, repels) = (mine.position, mine.repels);
            let trigger = self
                .agents
                .values()
                .find(|a| a.faction == repels && a.position.sqr_distance(position) <= trigger_sqr)
                .map(|a| a.id);
            let Some(trigger) = trigger else {
                continue;
            };

            self.mines.remove(&mine_id);
            let victims: Vec<AgentId> = self
                .agents
                .values()
                .filter(|a| a.faction == repels && a.position.sqr_distance(position) <= blast_sqr)
                .map(|a| a.id)
                .collect();
            if let Some(agent) = self.agents.get(&trigger) {
                let description = format!("{agent} set off a repellent mine at {position}.");
                self.emit(
                    events,
                    Importance::Low,
                    VersusEventKind::AnimalAction { agent_id: trigger },
                    description,
                );
            }
            for victim in victims {
                self.damage_agent(victim, damage, events);
            }
        }
    }

    /// Throttled dominance recompute, capacity ledger and director review.
    fn process_block_refresh(&mut self, coord: BlockCoord, events: &mut Vec<VersusEvent>) {
        let interval = self
            .config
            .secs_to_ticks(self.config.city.influence_update_interval_secs);
        let now = self.tick;

        let Some(block) = self.city.block_mut(coord) else {
            return;
        };
        if let Some(outcome) = block.refresh(now, interval) {
            if let Some(previous) = outcome.dominance_changed_from {
                let current = block.dominant_faction();
                let supported = i64::from(block.faction_members_supported());
                self.max_faction_size[previous.index()] -= supported;
                self.max_faction_size[current.index()] += supported;
                events.push(VersusEvent {
                    tick: now,
                    importance: Importance::Medium,
                    description: format!("{block} is now held by {current} (was {previous})."),
                    kind: VersusEventKind::BlockDominanceChanged {
                        coord,
                        previous,
                        current,
                    },
                });
            }

            if outcome.needs_review() {
                self.review_block(coord, events);
            }
            // A flip re-rates the bordering blocks as well.
            if outcome.dominance_changed_from.is_some() {
                for neighbor in self.city.neighbors(coord) {
                    self.review_block(neighbor, events);
                }
            }
        }

        self.event_queue
            .schedule(now + interval, ScheduledEventKind::BlockRefresh { coord });
    }

    /// Have every director re-rate one block.
    fn review_block(&mut self, coord: BlockCoord, events: &mut Vec<VersusEvent>) {
        let Some(block) = self.city.block_mut(coord) else {
            return;
        };
        for (faction, director) in &mut self.directors {
            let before = block.priority(*faction);
            let after = director.evaluate(block, &self.config.director, &mut self.rng);
            if before != after {
                events.push(VersusEvent {
                    tick: self.tick,
                    importance: Importance::Low,
                    description: format!(
                        "The {faction} director changed {block} from {before} to {after} priority."
                    ),
                    kind: VersusEventKind::BlockUpdated { coord },
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    /// Spawn a new agent at a random point in a block. The first decision
    /// comes one decision interval later.
    pub fn spawn_agent(
        &mut self,
        faction: Faction,
        coord: BlockCoord,
        events: &mut Vec<VersusEvent>,
    ) -> SimResult<AgentId> {
        let faction = faction.require_playable()?;
        let block = self.city.require_block(coord)?;
        let data = self
            .config
            .faction(faction)
            .ok_or(SimError::UnsupportedFaction(faction))?;

        let position = block.random_point(&mut self.rng);
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        let number = &mut self.next_name_number[faction.index()];
        let name = format!("{faction} {number}");
        *number += 1;

        let mut agent = Agent::new(
            id,
            faction,
            name,
            coord,
            position,
            &self.config,
            data,
            &mut self.rng,
        );
        agent.last_decision_tick = self.tick;
        let first_decision = self.tick + agent.decision_interval_ticks;
        self.agents.insert(id, agent);
        self.population[faction.index()] += 1;
        self.add_to_block(id, coord, events);

        self.event_queue
            .schedule(first_decision, ScheduledEventKind::AgentDecision { agent_id: id });
        Ok(id)
    }

    /// List an agent in a block's roster and point its home there.
    fn add_to_block(&mut self, agent_id: AgentId, coord: BlockCoord, events: &mut Vec<VersusEvent>) {
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return;
        };
        let Some(block) = self.city.block_mut(coord) else {
            return;
        };
        if !block.insert(agent_id, agent.faction) {
            return;
        }
        agent.home_block = coord;
        let description = format!("{agent} moved into {block}");
        self.emit(
            events,
            Importance::Medium,
            VersusEventKind::BlockUpdated { coord },
            description,
        );
    }

    fn remove_from_block(
        &mut self,
        agent_id: AgentId,
        coord: BlockCoord,
        events: &mut Vec<VersusEvent>,
    ) {
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        let Some(block) = self.city.block_mut(coord) else {
            return;
        };
        if block.remove(agent_id, agent.faction) {
            let description = format!("{agent} moved out of {block}");
            self.emit(
                events,
                Importance::Medium,
                VersusEventKind::BlockUpdated { coord },
                description,
            );
        }
    }

    /// Move an agent's roster entry from one block to another.
    pub(crate) fn move_home(
        &mut self,
        agent_id: AgentId,
        from: BlockCoord,
        to: BlockCoord,
        events: &mut Vec<VersusEvent>,
    ) {
        self.remove_from_block(agent_id, from, events);
        self.add_to_block(agent_id, to, events);
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            if agent.expand_to == Some(to) {
                agent.expand_to = None;
            }
        }
    }

    /// Remove an agent from the game: roster, then ledger, then table, then
    /// the announcement.
    pub(crate) fn destroy_agent(
        &mut self,
        agent_id: AgentId,
        reason: &str,
        events: &mut Vec<VersusEvent>,
    ) {
        let Some((home, faction)) = self.agents.get(&agent_id).map(|a| (a.home_block, a.faction))
        else {
            return;
        };
        self.remove_from_block(agent_id, home, events);
        let population = &mut self.population[faction.index()];
        *population = population.saturating_sub(1);
        let Some(agent) = self.agents.remove(&agent_id) else {
            return;
        };
        self.emit(
            events,
            Importance::High,
            VersusEventKind::AnimalLeftCity { agent_id, faction },
            format!("{agent} {reason}"),
        );
    }

    pub(crate) fn place_mine(&mut self, placed_by: AgentId, position: WorldPos, repels: Faction) -> MineId {
        let id = MineId(self.next_mine_id);
        self.next_mine_id += 1;
        self.mines.insert(
            id,
            Mine {
                id,
                position,
                repels,
                placed_by,
            },
        );
        id
    }

    pub(crate) fn drop_pickup(&mut self, kind: usize, position: WorldPos, block: BlockCoord) -> PickupId {
        let id = PickupId(self.next_pickup_id);
        self.next_pickup_id += 1;
        self.pickups.insert(
            id,
            Pickup {
                id,
                position,
                kind,
                block,
            },
        );
        let ttl = self.config.secs_to_ticks(self.config.repellent.pickup_ttl_secs);
        self.event_queue
            .schedule(self.tick + ttl, ScheduledEventKind::PickupExpired { pickup_id: id });
        id
    }

    pub(crate) fn emit(
        &self,
        events: &mut Vec<VersusEvent>,
        importance: Importance,
        kind: VersusEventKind,
        description: String,
    ) {
        events.push(VersusEvent {
            tick: self.tick,
            importance,
            description,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config(width: i32, depth: i32) -> GameConfig {
        let mut config = GameConfig::default();
        config.city.width = width;
        config.city.depth = depth;
        config.city.populate = false;
        config
    }

    fn empty_sim(width: i32, depth: i32) -> SimState {
        SimState::with_config(1, empty_config(width, depth)).unwrap()
    }

    #[test]
    fn new_sim_is_populated_and_ledgers_agree() {
        let sim = SimState::new(42).unwrap();
        let cats = sim.agents.values().filter(|a| a.faction == Faction::Cat).count();
        assert_eq!(sim.population(Faction::Cat) as usize, cats);
        assert!(sim.population(Faction::Cat) > 0);
        assert!(sim.population(Faction::Dog) > 0);

        let total: i64 = Faction::ALL.iter().map(|&f| sim.max_faction_size(f)).sum();
        assert_eq!(total, 15 * 15 * 10);
        assert_eq!(sim.max_faction_size(Faction::Neutral), total);
    }

    #[test]
    fn determinism_two_sims_same_seed() {
        let mut a = SimState::new(7).unwrap();
        let mut b = SimState::new(7).unwrap();
        let ea = a.step(&[], 5_000).events;
        let eb = b.step(&[], 5_000).events;
        assert_eq!(ea, eb);
        let pa: Vec<_> = a.agents.values().map(|x| (x.id, x.position, x.state)).collect();
        let pb: Vec<_> = b.agents.values().map(|x| (x.id, x.position, x.state)).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn unsorted_command_batch_applies_in_tick_order() {
        let mut sim = empty_sim(3, 3);
        let coord = BlockCoord::new(1, 1);
        let set = |tick, priority| SimCommand {
            tick,
            action: SimAction::SetPriority {
                coord,
                faction: Faction::Cat,
                priority,
            },
        };
        let batch = [
            set(10, Priority::High),
            set(5, Priority::Low),
            set(500, Priority::Breed),
        ];
        sim.step(&batch, 20);
        assert_eq!(sim.tick, 20);
        assert_eq!(sim.get_priority(coord, Faction::Cat).unwrap(), Priority::High);
        assert_eq!(sim.director(Faction::Cat).unwrap().high_priority_count(), 1);
    }

    #[test]
    fn step_advances_tick() {
        let mut sim = empty_sim(3, 3);
        sim.step(&[], 100);
        assert_eq!(sim.tick, 100);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = empty_config(3, 3);
        config.frame_interval_ticks = 0;
        assert!(matches!(
            SimState::with_config(1, config),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn spawn_lists_agent_in_exactly_one_roster() {
        let mut sim = empty_sim(3, 3);
        let mut events = Vec::new();
        let coord = BlockCoord::new(1, 2);
        let id = sim.spawn_agent(Faction::Dog, coord, &mut events).unwrap();

        let holders: Vec<_> = sim
            .city
            .blocks()
            .filter(|b| b.contains(id, Faction::Dog))
            .map(|b| b.coord)
            .collect();
        assert_eq!(holders, vec![coord]);
        assert_eq!(sim.agent(id).unwrap().home_block, coord);
        assert_eq!(sim.agent(id).unwrap().name, "Dog 0");
        assert_eq!(events.len(), 1);
        assert!(events[0].description.starts_with("Dog 0 moved into"));
        assert!(events[0].description.ends_with("(1, 2)"));
    }

    #[test]
    fn neutral_spawn_is_rejected() {
        let mut sim = empty_sim(3, 3);
        let mut events = Vec::new();
        assert!(matches!(
            sim.spawn_agent(Faction::Neutral, BlockCoord::new(0, 0), &mut events),
            Err(SimError::UnsupportedFaction(Faction::Neutral))
        ));
        assert!(matches!(
            sim.spawn_agent(Faction::Cat, BlockCoord::new(5, 0), &mut events),
            Err(SimError::BlockOutOfBounds { x: 5, y: 0 })
        ));
        assert!(sim.agents.is_empty());
    }

    #[test]
    fn spawn_command_for_neutral_is_dropped_not_fatal() {
        let mut sim = empty_sim(3, 3);
        let cmd = SimCommand {
            tick: 1,
            action: SimAction::SpawnAgent {
                faction: Faction::Neutral,
                coord: BlockCoord::new(0, 0),
            },
        };
        sim.step(&[cmd], 10);
        assert!(sim.agents.is_empty());
    }

    #[test]
    fn destroy_removes_roster_before_announcing() {
        let mut sim = empty_sim(3, 3);
        let mut events = Vec::new();
        let coord = BlockCoord::new(0, 0);
        let id = sim.spawn_agent(Faction::Cat, coord, &mut events).unwrap();
        events.clear();

        sim.destroy_agent(id, "left.", &mut events);
        assert!(sim.agent(id).is_none());
        assert!(!sim.block(coord).unwrap().contains(id, Faction::Cat));
        assert_eq!(sim.population(Faction::Cat), 0);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, VersusEventKind::BlockUpdated { .. }));
        assert_eq!(events[1].importance, Importance::High);
        assert_eq!(events[1].description, "Cat 0 left.");

        // The pending decision for the destroyed agent fires harmlessly.
        sim.step(&[], 2_000);
        assert!(sim.agent(id).is_none());
    }

    #[test]
    fn priority_commands_go_through_director_cap() {
        let mut config = empty_config(3, 3);
        config.director.max_high_priority = 1;
        let mut sim = SimState::with_config(1, config).unwrap();
        let a = BlockCoord::new(0, 0);
        let b = BlockCoord::new(2, 2);
        let commands = [
            SimCommand {
                tick: 1,
                action: SimAction::SetPriority {
                    coord: a,
                    faction: Faction::Cat,
                    priority: Priority::High,
                },
            },
            SimCommand {
                tick: 2,
                action: SimAction::SetPriority {
                    coord: b,
                    faction: Faction::Cat,
                    priority: Priority::High,
                },
            },
            SimCommand {
                tick: 3,
                action: SimAction::CyclePriority {
                    coord: b,
                    faction: Faction::Dog,
                },
            },
        ];
        sim.step(&commands, 5);
        assert_eq!(sim.get_priority(a, Faction::Cat).unwrap(), Priority::High);
        assert_eq!(sim.get_priority(b, Faction::Cat).unwrap(), Priority::Medium);
        assert_eq!(sim.get_priority(b, Faction::Dog).unwrap(), Priority::High);
        assert_eq!(sim.director(Faction::Cat).unwrap().high_priority_count(), 1);
    }

    #[test]
    fn priority_query_rejects_neutral_and_missing_blocks() {
        let sim = empty_sim(2, 2);
        assert!(matches!(
            sim.get_priority(BlockCoord::new(0, 0), Faction::Neutral),
            Err(SimError::UnsupportedFaction(_))
        ));
        assert!(matches!(
            sim.get_priority(BlockCoord::new(9, 9), Faction::Cat),
            Err(SimError::BlockOutOfBounds { .. })
        ));
    }

    #[test]
    fn dominance_flip_moves_capacity() {
        let mut sim = empty_sim(3, 3);
        let mut events = Vec::new();
        let coord = BlockCoord::new(1, 1);
        for _ in 0..5 {
            sim.spawn_agent(Faction::Dog, coord, &mut events).unwrap();
        }
        let result = sim.step(&[], 1);
        assert_eq!(sim.block(coord).unwrap().dominant_faction(), Faction::Dog);
        assert_eq!(sim.max_faction_size(Faction::Dog), 10);
        assert_eq!(sim.max_faction_size(Faction::Neutral), 80);
        assert!(result.events.iter().any(|e| matches!(
            e.kind,
            VersusEventKind::BlockDominanceChanged {
                previous: Faction::Neutral,
                current: Faction::Dog,
                ..
            }
        )));
        // Lead of 5 with no enemies: the dog director wants the block bred.
        assert_eq!(sim.get_priority(coord, Faction::Dog).unwrap(), Priority::Breed);
    }

    #[test]
    fn dominance_flip_re_rates_bordering_blocks() {
        let mut config = empty_config(2, 1);
        config.director.importance_scale = 1.0;
        let mut sim = SimState::with_config(1, config).unwrap();
        let mut events = Vec::new();
        let flipped = BlockCoord::new(0, 0);
        let border = BlockCoord::new(1, 0);
        for _ in 0..5 {
            sim.spawn_agent(Faction::Dog, flipped, &mut events).unwrap();
        }
        let result = sim.step(&[], 1);
        assert_eq!(sim.block(flipped).unwrap().dominant_faction(), Faction::Dog);
        // The border block is empty and quiet, so only the flip next door
        // could have re-rated it. It is the dog home corner.
        assert_eq!(sim.get_priority(border, Faction::Dog).unwrap(), Priority::High);
        assert_eq!(sim.get_priority(border, Faction::Cat).unwrap(), Priority::Medium);
        assert!(result
            .events
            .iter()
            .any(|e| e.kind == VersusEventKind::BlockUpdated { coord: border }));
    }

    #[test]
    fn player_presence_follows_enter_move_exit() {
        let mut sim = empty_sim(3, 3);
        let a = BlockCoord::new(0, 0);
        let b = BlockCoord::new(1, 0);
        let commands = [
            SimCommand {
                tick: 1,
                action: SimAction::PlayerEnterBlock {
                    coord: a,
                    position: WorldPos::new(0.0, 0.0),
                },
            },
            SimCommand {
                tick: 2,
                action: SimAction::PlayerMove {
                    position: WorldPos::new(120.0, 0.0),
                },
            },
        ];
        sim.step(&commands, 3);
        assert!(!sim.block(a).unwrap().player_present);
        assert!(sim.block(b).unwrap().player_present);
        assert_eq!(sim.player.unwrap().block, b);

        let exit = [SimCommand {
            tick: 4,
            action: SimAction::PlayerExitBlock,
        }];
        sim.step(&exit, 5);
        assert!(sim.player.is_none());
        assert!(!sim.block(b).unwrap().player_present);
    }

    #[test]
    fn dog_on_a_cat_mine_sets_it_off() {
        let mut sim = empty_sim(3, 3);
        let mut events = Vec::new();
        let coord = BlockCoord::new(1, 1);
        let center = sim.block(coord).unwrap().center;
        let trigger = sim.spawn_agent(Faction::Dog, coord, &mut events).unwrap();
        let bystander = sim.spawn_agent(Faction::Dog, coord, &mut events).unwrap();
        let cat = sim.spawn_agent(Faction::Cat, coord, &mut events).unwrap();
        let spots = [
            (trigger, center),
            (bystander, WorldPos::new(center.x + 3.0, center.z)),
            (cat, WorldPos::new(center.x, center.z + 1.0)),
        ];
        for (id, pos) in spots {
            let agent = sim.agents.get_mut(&id).unwrap();
            agent.position = pos;
            agent.destination = pos;
        }
        sim.place_mine(cat, center, Faction::Dog);
        // A mine meant for cats stays put under a dog.
        let under_dog = sim.place_mine(trigger, WorldPos::new(center.x + 3.0, center.z), Faction::Cat);
        let far = sim.place_mine(cat, WorldPos::new(center.x + 30.0, center.z), Faction::Dog);

        let first_frame = sim.config.frame_interval_ticks;
        let result = sim.step(&[], first_frame);
        assert!(result
            .events
            .iter()
            .any(|e| e.description.contains("set off a repellent mine")));
        assert_eq!(sim.agent(trigger).unwrap().health.current(), 50.0);
        assert_eq!(sim.agent(bystander).unwrap().health.current(), 50.0);
        assert_eq!(sim.agent(cat).unwrap().health.current(), 100.0);
        assert_eq!(sim.mines.len(), 2);
        assert!(sim.mines.contains_key(&far));
        assert!(sim.mines.contains_key(&under_dog));
    }

    #[test]
    fn pickups_expire() {
        let mut sim = empty_sim(2, 2);
        let id = sim.drop_pickup(0, WorldPos::default(), BlockCoord::new(0, 0));
        sim.step(&[], 9_999);
        assert!(sim.pickups.contains_key(&id));
        sim.step(&[], 10_000);
        assert!(!sim.pickups.contains_key(&id));
    }
}
