// Agent decision logic: the per-agent state machine.
//
// Each `AgentDecision` event runs one evaluation for one agent, then
// reschedules the next one a jittered interval later. Movement is not done
// here; the `Frame` event integrates it every frame (see `sim.rs`). A
// decision only picks states, destinations and targets.
//
// One evaluation:
//
//   1. Defeat check. Health at zero stands the agent back up at 1 and sends
//      it fleeing toward a friendly block. Combat never kills; only the
//      friendly-or-die search below can remove an agent.
//   2. Enemy scan (skipped while attacking or fleeing). A dog whose home
//      block holds the human player goes straight for the player.
//      Otherwise the nearest live enemy in the home roster is engaged when
//      closer than `chase_distance / 2`.
//   3. The current state's update:
//
//   Idle       → PlaceRepellentMine if holding enough to craft anything;
//                Breed on a Breed-priority block with `breeding_chance`;
//                otherwise with `idle_action_chance` either volunteer to
//                expand (healthy, home priority Low) or go gather.
//   Gather     → accrue `rate × elapsed`, Idle on arrival.
//   PlaceMine  → on arrival drop a pickup (player present) or a mine.
//   Flee       → Hide on arrival.
//   Hide       → Idle once recovered.
//   Attack     → give up if the target is gone or we strayed past chase
//                range from home; strike when in range and off cooldown;
//                otherwise chase.
//   Expand     → Idle within attack distance of the destination.
//   Breed      → after the deadline, a newborn joins the home block and is
//                sent to expand.
//
// Wounds are handled as they happen in `damage_agent`, not on the next
// decision: the flee thresholds in `FactionData` pick between carrying on,
// fleeing inside the home block and fleeing to a friendly block.
//
// See also: `agent.rs` for the per-agent mechanics, `sim.rs` for the loop
// and lifecycle helpers, `grid.rs` for `ring_search`.

use crate::agent::{AttackTarget, WoundResponse};
use crate::event::{ScheduledEventKind, VersusEvent, VersusEventKind};
use crate::faction::FactionData;
use crate::sim::SimState;
use crate::types::*;

const GAVE_UP_COMPETITION: &str = "feels there is too much competition within the faction. \
     They have given up the fight and left the city.";
const GAVE_UP_NO_REFUGE: &str = "was unable to find a nearby block to feel safe in. \
     They have given up the fight and left the city.";

impl SimState {
    /// Run one decision for an agent and schedule the next. Does nothing if
    /// the agent no longer exists.
    pub(crate) fn process_agent_decision(
        &mut self,
        agent_id: AgentId,
        events: &mut Vec<VersusEvent>,
    ) {
        let Some(faction) = self.agents.get(&agent_id).map(|a| a.faction) else {
            return;
        };
        let Some(data) = self.config.faction(faction).cloned() else {
            tracing::warn!(agent = %agent_id, %faction, "no behavior data; agent halted");
            return;
        };

        if !self.recover_from_defeat(agent_id, &data, events) {
            return;
        }

        self.scan_for_enemies(agent_id, &data);

        let Some(state) = self.agents.get(&agent_id).map(|a| a.state) else {
            return;
        };
        match state {
            AgentState::Idle => self.update_idle(agent_id, &data, events),
            AgentState::GatherRepellent => self.update_gather(agent_id, &data),
            AgentState::PlaceRepellentMine => self.update_place_repellent(agent_id, &data, events),
            AgentState::Flee => {
                if let Some(agent) = self.agents.get_mut(&agent_id) {
                    if agent.has_arrived() {
                        agent.state = AgentState::Hide;
                    }
                }
            }
            AgentState::Hide => {
                if let Some(agent) = self.agents.get_mut(&agent_id) {
                    if agent.is_recovered(&data) {
                        agent.state = AgentState::Idle;
                    }
                }
            }
            AgentState::Attack => self.update_attack(agent_id, &data, events),
            AgentState::Expand => {
                if let Some(agent) = self.agents.get_mut(&agent_id) {
                    let reach = data.attack_distance * data.attack_distance;
                    if agent.position.sqr_distance(agent.destination) < reach {
                        agent.state = AgentState::Idle;
                        agent.expand_to = None;
                    }
                }
            }
            AgentState::Breed => self.update_breed(agent_id, &data, events),
        }

        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.last_decision_tick = self.tick;
            let next_tick = self.tick + agent.decision_interval_ticks;
            self.event_queue
                .schedule(next_tick, ScheduledEventKind::AgentDecision { agent_id });
        }
    }

    /// Stand a defeated agent back up and send it to safety. Returns `false`
    /// if the agent is gone afterwards.
    fn recover_from_defeat(
        &mut self,
        agent_id: AgentId,
        data: &FactionData,
        events: &mut Vec<VersusEvent>,
    ) -> bool {
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return false;
        };
        if agent.health.is_alive() {
            return true;
        }
        agent.health.set(1.0);
        agent.state = AgentState::Flee;
        agent.attack_target = None;
        let description = format!(
            "{agent} has been hit by too much repellent. They are fleeing from the block."
        );
        self.emit(
            events,
            Importance::Medium,
            VersusEventKind::AnimalAction { agent_id },
            description,
        );
        self.flee_to_friendly_or_die(agent_id, data, events)
    }

    // -----------------------------------------------------------------------
    // Damage and fleeing
    // -----------------------------------------------------------------------

    /// Apply damage to an agent and react to the wound immediately.
    pub(crate) fn damage_agent(
        &mut self,
        agent_id: AgentId,
        amount: f32,
        events: &mut Vec<VersusEvent>,
    ) {
        let now = self.tick;
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return;
        };
        let Some(data) = self.config.factions.get(&agent.faction) else {
            return;
        };
        let change = agent.health.apply_damage(amount, now);
        let response = agent.wound_response(change, data);
        let data = data.clone();
        let hit = format!("{agent} has been hit by {amount:.1} units of repellent.");

        let description = match response {
            WoundResponse::None => return,
            WoundResponse::ContinueOrders => format!(
                "{hit} They are fleeing from the source but continuing to carry out their expansion orders."
            ),
            WoundResponse::FleeWithinHome => {
                let home = agent.home_block;
                agent.state = AgentState::Flee;
                agent.attack_target = None;
                let home_name = self.block_label(home);
                if let Some(point) = self.random_point_in(home) {
                    if let Some(agent) = self.agents.get_mut(&agent_id) {
                        agent.destination = point;
                    }
                }
                format!("{hit} They are fleeing from the source but staying within {home_name} for now.")
            }
            WoundResponse::FleeToFriendly => {
                agent.state = AgentState::Flee;
                agent.attack_target = None;
                format!(
                    "{hit} They are abandoning their expansion orders and seeking refuge if they can find it."
                )
            }
        };
        self.emit(
            events,
            Importance::Medium,
            VersusEventKind::AnimalAction { agent_id },
            description,
        );
        if response == WoundResponse::FleeToFriendly {
            self.flee_to_friendly_or_die(agent_id, &data, events);
        }
    }

    /// Point the agent at a random spot in the nearest block its faction
    /// dominates, or remove it from the game. Returns whether it survived.
    ///
    /// An over-capacity faction loses the agent without searching.
    pub(crate) fn flee_to_friendly_or_die(
        &mut self,
        agent_id: AgentId,
        data: &FactionData,
        events: &mut Vec<VersusEvent>,
    ) -> bool {
        let Some((faction, home)) = self.agents.get(&agent_id).map(|a| (a.faction, a.home_block))
        else {
            return false;
        };

        if i64::from(self.population(faction)) > self.max_faction_size(faction) {
            self.destroy_agent(agent_id, GAVE_UP_COMPETITION, events);
            return false;
        }

        let refuge = self.city.ring_search(home, data.friendly_search_distance, |block| {
            block.dominant_faction() == faction
        });
        let Some(point) = refuge.and_then(|coord| self.random_point_in(coord)) else {
            self.destroy_agent(agent_id, GAVE_UP_NO_REFUGE, events);
            return false;
        };
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.destination = point;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Enemy scan
    // -----------------------------------------------------------------------

    fn scan_for_enemies(&mut self, agent_id: AgentId, data: &FactionData) {
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        if matches!(agent.state, AgentState::Attack | AgentState::Flee) {
            return;
        }
        let (faction, home, position) = (agent.faction, agent.home_block, agent.position);

        let player_here = self.player.is_some_and(|p| p.block == home);
        let target = if faction == Faction::Dog && player_here {
            Some(AttackTarget::Player)
        } else {
            let engage_sqr = (data.chase_distance / 2.0).powi(2);
            self.nearest_enemy(home, faction, position)
                .filter(|&(_, sqr)| sqr < engage_sqr)
                .map(|(enemy, _)| AttackTarget::Agent(enemy))
        };

        if let Some(target) = target {
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.state = AgentState::Attack;
                agent.attack_target = Some(target);
            }
        }
    }

    /// Nearest enemy listed in `home`, with its squared distance. Roster
    /// entries without a live agent are skipped.
    fn nearest_enemy(
        &self,
        home: BlockCoord,
        faction: Faction,
        position: WorldPos,
    ) -> Option<(AgentId, f32)> {
        let enemies = self.city.block(home)?.enemies_of(faction)?;
        enemies
            .iter()
            .filter_map(|id| self.agents.get(id))
            .map(|enemy| (enemy.id, enemy.position.sqr_distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    // -----------------------------------------------------------------------
    // State updates
    // -----------------------------------------------------------------------

    fn update_idle(&mut self, agent_id: AgentId, data: &FactionData, events: &mut Vec<VersusEvent>) {
        let min_cost = self.config.repellent.min_cost();
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        let (faction, home, repellent) = (agent.faction, agent.home_block, agent.repellent);
        let recovered = agent.is_recovered(data);
        let priority = self
            .city
            .block(home)
            .map_or(Priority::Medium, |b| b.priority(faction));

        if repellent >= min_cost {
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.state = AgentState::PlaceRepellentMine;
                agent.destination = agent.position;
            }
        } else if priority == Priority::Breed && self.rng.chance(data.breeding_chance) {
            let deadline = self.tick + self.config.secs_to_ticks(data.breeding_duration_secs);
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.state = AgentState::Breed;
                agent.revaluate_at_tick = deadline;
            }
        } else if self.rng.chance(data.idle_action_chance) {
            if recovered && priority == Priority::Low {
                self.expand_if_possible(agent_id, data.expand_range, events);
            } else {
                self.start_gathering(agent_id);
            }
        }
    }

    /// Send the agent to gather at a random point in its home block.
    fn start_gathering(&mut self, agent_id: AgentId) {
        let Some(home) = self.agents.get(&agent_id).map(|a| a.home_block) else {
            return;
        };
        let point = self.random_point_in(home);
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.state = AgentState::GatherRepellent;
            if let Some(point) = point {
                agent.destination = point;
            }
        }
    }

    /// Look for a High-priority block within `range` rings and head there;
    /// fall back to gathering at home.
    pub(crate) fn expand_if_possible(
        &mut self,
        agent_id: AgentId,
        range: i32,
        events: &mut Vec<VersusEvent>,
    ) {
        let Some((faction, home)) = self.agents.get(&agent_id).map(|a| (a.faction, a.home_block))
        else {
            return;
        };
        let target = self
            .city
            .ring_search(home, range, |block| block.priority(faction) == Priority::High);
        let Some(target) = target else {
            self.start_gathering(agent_id);
            return;
        };
        let Some(point) = self.random_point_in(target) else {
            self.start_gathering(agent_id);
            return;
        };

        let description = format!(
            "{} is leaving {} in an attempt to take {} for the {faction}s.",
            self.agent_label(agent_id),
            self.block_label(home),
            self.block_label(target),
        );
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.state = AgentState::Expand;
            agent.expand_to = Some(target);
            agent.destination = point;
        }
        self.emit(
            events,
            Importance::Medium,
            VersusEventKind::AnimalAction { agent_id },
            description,
        );
    }

    fn update_gather(&mut self, agent_id: AgentId, data: &FactionData) {
        let now = self.tick;
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return;
        };
        let elapsed = self
            .config
            .ticks_to_secs(now.saturating_sub(agent.last_decision_tick));
        agent.gather(elapsed, data.randomize_gathering_speed, &mut self.rng);
        if agent.has_arrived() {
            agent.state = AgentState::Idle;
        }
    }

    /// Craft and drop something at the agent's position: an ammo pickup when
    /// the player is in the block and the roll picks an affordable kind,
    /// otherwise a mine. An agent that can afford neither goes back to
    /// gathering.
    fn update_place_repellent(
        &mut self,
        agent_id: AgentId,
        data: &FactionData,
        events: &mut Vec<VersusEvent>,
    ) {
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        if !agent.has_arrived() {
            return;
        }
        let (faction, home, position, repellent) =
            (agent.faction, agent.home_block, agent.position, agent.repellent);
        let player_here = self.city.block(home).is_some_and(|b| b.player_present);

        let mut pickup = None;
        if player_here {
            let kinds = self.config.repellent.pickup_costs.len();
            for (kind, &cost) in self.config.repellent.pickup_costs.iter().enumerate() {
                if cost < repellent && self.rng.chance(1.0 / kinds as f32) {
                    pickup = Some((kind, cost));
                    break;
                }
            }
        }

        let mine_cost = self.config.repellent.mine_cost;
        let (spent, description) = match pickup {
            Some((kind, cost)) => {
                self.drop_pickup(kind, position, home);
                (
                    cost,
                    format!("{} dropped repellent ammo at {position}.", self.agent_label(agent_id)),
                )
            }
            None if repellent >= mine_cost => {
                let repels = faction.enemy().unwrap_or(Faction::Neutral);
                self.place_mine(agent_id, position, repels);
                (
                    mine_cost,
                    format!("{} placed a repellent mine at {position}.", self.agent_label(agent_id)),
                )
            }
            None => {
                self.start_gathering(agent_id);
                return;
            }
        };

        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.repellent = (agent.repellent - spent).max(0.0);
            agent.state = AgentState::Idle;
            agent.add_experience(data.place_repellent_experience, data);
        }
        self.emit(
            events,
            Importance::Low,
            VersusEventKind::AnimalAction { agent_id },
            description,
        );
    }

    fn update_attack(&mut self, agent_id: AgentId, data: &FactionData, events: &mut Vec<VersusEvent>) {
        let now = self.tick;
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        let (home, position, target, next_attack) = (
            agent.home_block,
            agent.position,
            agent.attack_target,
            agent.next_attack_tick,
        );

        let target_position = match target {
            Some(AttackTarget::Agent(enemy)) => self.agents.get(&enemy).map(|e| e.position),
            Some(AttackTarget::Player) => self.player.map(|p| p.position),
            None => None,
        };
        let home_center = self.city.block(home).map(|b| b.center);
        let strayed = home_center.is_none_or(|center| {
            center.sqr_distance(position) > data.chase_distance * data.chase_distance
        });

        let (Some(target), Some(target_position)) = (target, target_position) else {
            self.stand_down(agent_id);
            return;
        };
        if strayed {
            self.stand_down(agent_id);
            return;
        }

        if position.sqr_distance(target_position) < data.attack_distance * data.attack_distance {
            if now < next_attack {
                return;
            }
            let cooldown = self.config.secs_to_ticks(data.attack_interval_secs);
            if let Some(agent) = self.agents.get_mut(&agent_id) {
                agent.next_attack_tick = now + cooldown;
            }
            match target {
                AttackTarget::Agent(enemy) => self.damage_agent(enemy, data.damage, events),
                AttackTarget::Player => {
                    let description =
                        format!("{} bit the player for {:.1} damage.", self.agent_label(agent_id), data.damage);
                    self.emit(
                        events,
                        Importance::Medium,
                        VersusEventKind::PlayerDamaged {
                            agent_id,
                            amount: data.damage,
                        },
                        description,
                    );
                }
            }
        } else if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.destination = target_position;
        }
    }

    fn stand_down(&mut self, agent_id: AgentId) {
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.state = AgentState::Idle;
            agent.attack_target = None;
            agent.destination = agent.position;
        }
    }

    fn update_breed(&mut self, agent_id: AgentId, data: &FactionData, events: &mut Vec<VersusEvent>) {
        let Some(agent) = self.agents.get(&agent_id) else {
            return;
        };
        if self.tick <= agent.revaluate_at_tick {
            return;
        }
        let (faction, home) = (agent.faction, agent.home_block);

        match self.spawn_agent(faction, home, events) {
            Ok(newborn) => {
                let description = format!(
                    "{} was born in {} and is being sent out to expand the faction's control.",
                    self.agent_label(newborn),
                    self.block_label(home),
                );
                self.emit(
                    events,
                    Importance::Medium,
                    VersusEventKind::AnimalAction { agent_id: newborn },
                    description,
                );
                self.expand_if_possible(newborn, data.newborn_expand_range, events);
                if let Some(agent) = self.agents.get_mut(&agent_id) {
                    agent.add_experience(data.breed_experience, data);
                }
            }
            Err(err) => {
                tracing::warn!(agent = %agent_id, %faction, %err, "litter could not be spawned");
            }
        }

        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.state = AgentState::Idle;
        }
    }

    // -----------------------------------------------------------------------
    // Small lookups
    // -----------------------------------------------------------------------

    fn random_point_in(&mut self, coord: BlockCoord) -> Option<WorldPos> {
        let block = self.city.block(coord)?;
        Some(block.random_point(&mut self.rng))
    }

    fn block_label(&self, coord: BlockCoord) -> String {
        self.city
            .block(coord)
            .map_or_else(|| coord.to_string(), |b| b.to_string())
    }

    fn agent_label(&self, agent_id: AgentId) -> String {
        self.agents
            .get(&agent_id)
            .map_or_else(|| agent_id.to_string(), |a| a.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn quiet_sim(width: i32, depth: i32) -> SimState {
        let mut config = GameConfig::default();
        config.city.width = width;
        config.city.depth = depth;
        config.city.populate = false;
        for data in config.factions.values_mut() {
            data.idle_action_chance = 0.0;
            data.breeding_chance = 0.0;
        }
        SimState::with_config(3, config).unwrap()
    }

    fn spawn(sim: &mut SimState, faction: Faction, coord: BlockCoord) -> AgentId {
        let mut events = Vec::new();
        sim.spawn_agent(faction, coord, &mut events).unwrap()
    }

    fn decide(sim: &mut SimState, id: AgentId) -> Vec<VersusEvent> {
        let mut events = Vec::new();
        sim.process_agent_decision(id, &mut events);
        events
    }

    #[test]
    fn enough_repellent_places_a_mine() {
        let mut sim = quiet_sim(3, 3);
        let id = spawn(&mut sim, Faction::Cat, BlockCoord::new(1, 1));
        sim.agents.get_mut(&id).unwrap().repellent = 12.0;

        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::PlaceRepellentMine);

        let events = decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.state, AgentState::Idle);
        assert!((agent.repellent - 2.0).abs() < 1e-5);
        assert_eq!(agent.levels.experience(), 2);
        assert_eq!(sim.mines.len(), 1);
        assert_eq!(sim.mines.values().next().unwrap().repels, Faction::Dog);
        assert!(events.iter().any(|e| e.description.contains("placed a repellent mine")));
    }

    #[test]
    fn short_of_a_mine_without_player_goes_gathering() {
        let mut sim = quiet_sim(3, 3);
        let id = spawn(&mut sim, Faction::Cat, BlockCoord::new(1, 1));
        sim.agents.get_mut(&id).unwrap().repellent = 9.0;
        decide(&mut sim, id);
        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::GatherRepellent);
        assert!(sim.mines.is_empty());
    }

    #[test]
    fn player_in_block_gets_an_ammo_pickup_that_expires() {
        let mut sim = quiet_sim(3, 3);
        sim.config.repellent.pickup_costs = vec![8.0];
        let coord = BlockCoord::new(1, 1);
        let center = sim.block(coord).unwrap().center;
        sim.step(
            &[crate::command::SimCommand {
                tick: 0,
                action: crate::command::SimAction::PlayerEnterBlock {
                    coord,
                    position: center,
                },
            }],
            1,
        );
        let id = spawn(&mut sim, Faction::Cat, coord);
        sim.agents.get_mut(&id).unwrap().repellent = 20.0;

        decide(&mut sim, id);
        let events = decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.state, AgentState::Idle);
        assert!((agent.repellent - 12.0).abs() < 1e-5);
        assert!(sim.mines.is_empty());
        assert!(events.iter().any(|e| e.description.contains("dropped repellent ammo")));

        let (&pickup, dropped) = sim.pickups.iter().next().unwrap();
        assert_eq!(dropped.block, coord);
        assert_eq!(dropped.kind, 0);
        // Dropped at tick 1 with a ten second lifetime.
        sim.step(&[], 10_000);
        assert!(sim.pickups.contains_key(&pickup));
        sim.step(&[], 10_001);
        assert!(!sim.pickups.contains_key(&pickup));
    }

    #[test]
    fn wounded_agent_flees_hides_then_recovers() {
        let mut sim = quiet_sim(3, 3);
        let home = BlockCoord::new(1, 1);
        let id = spawn(&mut sim, Faction::Cat, home);
        let mut events = Vec::new();
        sim.damage_agent(id, 60.0, &mut events);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.state, AgentState::Flee);
        assert!(sim.block(home).unwrap().contains_point(agent.destination));

        let hideout = agent.destination;
        sim.agents.get_mut(&id).unwrap().position = hideout;
        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Hide);

        // 40 of 100 is not enough to come out.
        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Hide);

        sim.tick = 10_000;
        sim.agents.get_mut(&id).unwrap().health.recharge(sim.tick, 8.0);
        assert_eq!(sim.agent(id).unwrap().health.current(), 80.0);
        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Idle);
    }

    #[test]
    fn enemy_within_half_chase_distance_is_engaged() {
        let mut sim = quiet_sim(3, 3);
        let coord = BlockCoord::new(1, 1);
        let cat = spawn(&mut sim, Faction::Cat, coord);
        let dog = spawn(&mut sim, Faction::Dog, coord);
        let center = sim.block(coord).unwrap().center;
        sim.agents.get_mut(&cat).unwrap().position = center;
        sim.agents.get_mut(&dog).unwrap().position = WorldPos::new(center.x + 30.0, center.z);

        decide(&mut sim, cat);
        let agent = sim.agent(cat).unwrap();
        assert_eq!(agent.state, AgentState::Attack);
        assert_eq!(agent.attack_target, Some(AttackTarget::Agent(dog)));
    }

    #[test]
    fn distant_enemy_is_ignored() {
        let mut sim = quiet_sim(3, 3);
        let coord = BlockCoord::new(1, 1);
        let cat = spawn(&mut sim, Faction::Cat, coord);
        let dog = spawn(&mut sim, Faction::Dog, coord);
        let center = sim.block(coord).unwrap().center;
        sim.agents.get_mut(&cat).unwrap().position = WorldPos::new(center.x - 45.0, center.z);
        sim.agents.get_mut(&dog).unwrap().position = WorldPos::new(center.x + 45.0, center.z);

        decide(&mut sim, cat);
        assert_eq!(sim.agent(cat).unwrap().state, AgentState::Idle);
    }

    #[test]
    fn dog_prefers_player_in_home_block() {
        let mut sim = quiet_sim(3, 3);
        let coord = BlockCoord::new(0, 0);
        let dog = spawn(&mut sim, Faction::Dog, coord);
        let cat = spawn(&mut sim, Faction::Cat, coord);
        let pos = sim.agent(dog).unwrap().position;
        sim.agents.get_mut(&cat).unwrap().position = pos;
        sim.player = Some(crate::sim::Player {
            block: coord,
            position: WorldPos::new(pos.x, pos.z + 0.5),
        });

        // Engaged and already in reach, so the first bite lands right away.
        let events = decide(&mut sim, dog);
        assert_eq!(sim.agent(dog).unwrap().attack_target, Some(AttackTarget::Player));
        assert!(events.iter().any(|e| matches!(
            e.kind,
            VersusEventKind::PlayerDamaged { amount, .. } if amount == 7.5
        )));
    }

    #[test]
    fn attack_lands_once_per_cooldown() {
        let mut sim = quiet_sim(3, 3);
        let coord = BlockCoord::new(1, 1);
        let cat = spawn(&mut sim, Faction::Cat, coord);
        let dog = spawn(&mut sim, Faction::Dog, coord);
        let center = sim.block(coord).unwrap().center;
        sim.agents.get_mut(&cat).unwrap().position = center;
        sim.agents.get_mut(&dog).unwrap().position = WorldPos::new(center.x + 0.5, center.z);

        decide(&mut sim, cat);
        assert_eq!(sim.agent(dog).unwrap().health.current(), 92.5);
        decide(&mut sim, cat);
        assert_eq!(sim.agent(dog).unwrap().health.current(), 92.5);

        sim.tick = 1_200;
        decide(&mut sim, cat);
        assert_eq!(sim.agent(dog).unwrap().health.current(), 85.0);
    }

    #[test]
    fn lost_target_stands_down() {
        let mut sim = quiet_sim(3, 3);
        let coord = BlockCoord::new(1, 1);
        let cat = spawn(&mut sim, Faction::Cat, coord);
        {
            let agent = sim.agents.get_mut(&cat).unwrap();
            agent.state = AgentState::Attack;
            agent.attack_target = Some(AttackTarget::Agent(AgentId(999)));
        }
        decide(&mut sim, cat);
        let agent = sim.agent(cat).unwrap();
        assert_eq!(agent.state, AgentState::Idle);
        assert_eq!(agent.attack_target, None);
    }

    #[test]
    fn gathering_accrues_rate_times_elapsed_then_idles() {
        let mut sim = quiet_sim(3, 3);
        for data in sim.config.factions.values_mut() {
            data.randomize_gathering_speed = false;
        }
        let id = spawn(&mut sim, Faction::Cat, BlockCoord::new(1, 1));
        {
            let agent = sim.agents.get_mut(&id).unwrap();
            agent.state = AgentState::GatherRepellent;
            agent.gathering_speed = 4.0;
            agent.destination = WorldPos::new(agent.position.x + 1.0, agent.position.z);
            agent.last_decision_tick = 0;
        }

        sim.tick = 500;
        decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert!((agent.repellent - 2.0).abs() < 1e-5);
        assert_eq!(agent.state, AgentState::GatherRepellent);

        let arrived = agent.destination;
        sim.agents.get_mut(&id).unwrap().position = arrived;
        sim.tick = 750;
        decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert!((agent.repellent - 3.0).abs() < 1e-5);
        assert_eq!(agent.state, AgentState::Idle);
    }

    #[test]
    fn strong_wound_while_expanding_seeks_friendly_block() {
        let mut sim = quiet_sim(5, 5);
        let home = BlockCoord::new(2, 2);
        let refuge = BlockCoord::new(1, 2);
        // Give the cats a block next door and enough capacity.
        let mut events = Vec::new();
        for _ in 0..5 {
            spawn(&mut sim, Faction::Cat, refuge);
        }
        sim.step(&[], 1);
        assert_eq!(sim.block(refuge).unwrap().dominant_faction(), Faction::Cat);

        let id = sim.spawn_agent(Faction::Cat, home, &mut events).unwrap();
        let own_point = sim.agent(id).unwrap().position;
        {
            let agent = sim.agents.get_mut(&id).unwrap();
            agent.state = AgentState::Expand;
            agent.destination = own_point;
        }
        sim.damage_agent(id, 90.0, &mut events);

        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.state, AgentState::Flee);
        assert_eq!(agent.health.current(), 10.0);
        assert!(sim.block(refuge).unwrap().contains_point(agent.destination));
        assert!(!sim.block(home).unwrap().contains_point(agent.destination));
    }

    #[test]
    fn weak_wound_while_expanding_keeps_orders() {
        let mut sim = quiet_sim(3, 3);
        let id = spawn(&mut sim, Faction::Dog, BlockCoord::new(1, 1));
        sim.agents.get_mut(&id).unwrap().state = AgentState::Expand;
        let mut events = Vec::new();
        sim.damage_agent(id, 60.0, &mut events);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Expand);
        assert!(events[0].description.contains("continuing to carry out"));
    }

    #[test]
    fn no_refuge_means_leaving_the_city() {
        let mut sim = quiet_sim(3, 3);
        let mut events = Vec::new();
        let id = sim.spawn_agent(Faction::Cat, BlockCoord::new(1, 1), &mut events).unwrap();
        // The population (1) exceeds the zero capacity cats hold.
        sim.damage_agent(id, 95.0, &mut events);
        assert!(sim.agent(id).is_none());
        assert_eq!(sim.population(Faction::Cat), 0);
        let last = events.last().unwrap();
        assert_eq!(last.importance, Importance::High);
        assert!(last.description.contains("too much competition"));
    }

    #[test]
    fn defeat_stands_agent_up_and_flees() {
        let mut sim = quiet_sim(5, 5);
        let refuge = BlockCoord::new(0, 0);
        for _ in 0..5 {
            spawn(&mut sim, Faction::Dog, refuge);
        }
        sim.step(&[], 1);

        let mut events = Vec::new();
        let id = sim.spawn_agent(Faction::Dog, BlockCoord::new(1, 0), &mut events).unwrap();
        sim.damage_agent(id, 500.0, &mut events);
        assert_eq!(sim.agent(id).unwrap().health.current(), 0.0);

        decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.health.current(), 1.0);
        assert_eq!(agent.state, AgentState::Flee);
        assert!(sim.block(refuge).unwrap().contains_point(agent.destination));
    }

    #[test]
    fn breeding_waits_for_deadline_then_spawns_expander() {
        let mut sim = quiet_sim(3, 3);
        let home = BlockCoord::new(1, 1);
        let id = spawn(&mut sim, Faction::Cat, home);
        {
            let agent = sim.agents.get_mut(&id).unwrap();
            agent.state = AgentState::Breed;
            agent.revaluate_at_tick = 30_000;
        }
        sim.tick = 30_000;
        decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Breed);
        assert_eq!(sim.population(Faction::Cat), 1);

        sim.tick = 30_001;
        let events = decide(&mut sim, id);
        assert_eq!(sim.agent(id).unwrap().state, AgentState::Idle);
        assert_eq!(sim.population(Faction::Cat), 2);
        assert_eq!(sim.agent(id).unwrap().levels.experience(), 1);
        assert!(events.iter().any(|e| e.description.contains("was born in")));
    }

    #[test]
    fn idle_agent_on_low_block_expands_to_nearby_high() {
        let mut sim = quiet_sim(5, 5);
        for data in sim.config.factions.values_mut() {
            data.idle_action_chance = 1.0;
        }
        let home = BlockCoord::new(2, 2);
        let target = BlockCoord::new(3, 2);
        sim.set_priority(home, Faction::Dog, Priority::Low).unwrap();
        sim.set_priority(target, Faction::Dog, Priority::High).unwrap();
        let id = spawn(&mut sim, Faction::Dog, home);

        let events = decide(&mut sim, id);
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.state, AgentState::Expand);
        assert_eq!(agent.expand_to, Some(target));
        assert!(sim.block(target).unwrap().contains_point(agent.destination));
        assert!(events.iter().any(|e| e.description.contains("in an attempt to take")));
    }
}
