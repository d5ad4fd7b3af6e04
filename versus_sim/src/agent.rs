// Animal agent data and per-agent mechanics.
//
// Cats and dogs share this one struct; behavioral differences come from
// `FactionData`. An agent holds its own state-machine state plus the
// continuous quantities the movement frame integrates (position, heading).
//
// References to other entities are IDs, never ownership:
// - `home_block` is a lookup key that agrees with the one block roster the
//   agent is listed in. The roster is authoritative.
// - `expand_to` and `attack_target` are weak: every use re-checks that the
//   referent still exists and drops it otherwise.
//
// What lives here is the mechanics that touch only the agent itself:
// frame movement and rotation, gathering accrual, level-up speed scaling and
// the classification of a health change into a response. Decisions that
// read the city, other agents or the RNG beyond this agent live in
// `behavior.rs`.
//
// See also: `behavior.rs` for the state machine, `health.rs`,
// `leveling.rs`, `faction.rs`.

use crate::config::GameConfig;
use crate::faction::FactionData;
use crate::health::{Health, HealthChange};
use crate::leveling::LevelSystem;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use versus_prng::GameRng;

/// Squared distance under which an agent counts as having reached its
/// destination. Movement snaps onto the target, so this only absorbs float
/// noise.
pub const ARRIVAL_SQR_EPSILON: f32 = 1e-6;

/// What an agent is trying to hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackTarget {
    Agent(AgentId),
    /// The human player in FPS mode.
    Player,
}

/// How an agent should react to a health change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WoundResponse {
    /// Not a wound (healing, no change, or the hit was fatal; defeat is
    /// handled on the next decision).
    None,
    /// Hurt, but carrying on with expansion orders.
    ContinueOrders,
    /// Run to a random point inside the home block.
    FleeWithinHome,
    /// Run to a friendly block, or give up and leave the city.
    FleeToFriendly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub faction: Faction,
    pub name: String,
    pub state: AgentState,
    pub health: Health,
    pub home_block: BlockCoord,
    /// The block this agent means to make home next.
    pub expand_to: Option<BlockCoord>,
    pub position: WorldPos,
    /// Facing on the ground plane, radians.
    pub heading: f32,
    pub destination: WorldPos,
    /// Gathered, unspent repellent. Never negative.
    pub repellent: f32,
    pub attack_target: Option<AttackTarget>,
    pub levels: LevelSystem,
    /// Current gathering rate in repellent per second.
    pub gathering_speed: f32,
    pub next_attack_tick: u64,
    /// Breeding deadline.
    pub revaluate_at_tick: u64,
    /// This agent's jittered decision period.
    pub decision_interval_ticks: u64,
    pub last_decision_tick: u64,
}

impl Agent {
    /// A fresh agent standing at `position` in `home_block`. The decision
    /// interval is jittered once here and kept for the agent's life.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AgentId,
        faction: Faction,
        name: String,
        home_block: BlockCoord,
        position: WorldPos,
        config: &GameConfig,
        data: &FactionData,
        rng: &mut GameRng,
    ) -> Self {
        let interval_secs = rng.jitter(data.decision_interval_secs, data.decision_jitter);
        Self {
            id,
            faction,
            name,
            state: AgentState::Idle,
            health: Health::new(
                data.health_max,
                data.health_recharge_rate,
                config.secs_to_ticks(data.health_recharge_delay_secs),
            ),
            home_block,
            expand_to: None,
            position,
            heading: 0.0,
            destination: position,
            repellent: 0.0,
            attack_target: None,
            levels: LevelSystem::new(config.levels.max_level),
            gathering_speed: data.max_gathering_speed,
            next_attack_tick: 0,
            revaluate_at_tick: 0,
            decision_interval_ticks: config.secs_to_ticks(interval_secs).max(1),
            last_decision_tick: 0,
        }
    }

    pub fn has_arrived(&self) -> bool {
        self.position.sqr_distance(self.destination) <= ARRIVAL_SQR_EPSILON
    }

    /// Speed multiplier for the current state.
    pub fn speed_multiplier(&self, data: &FactionData) -> f32 {
        match self.state {
            AgentState::Flee => data.flee_speed_multiplier,
            AgentState::Expand => data.expand_speed_multiplier,
            AgentState::Attack => data.chase_speed_multiplier,
            _ => 1.0,
        }
    }

    /// One movement frame: turn toward the destination and step toward it.
    pub fn advance(&mut self, data: &FactionData, dt_secs: f32) {
        if let Some(target_heading) = self.position.heading_to(self.destination) {
            self.heading =
                rotate_towards(self.heading, target_heading, data.rotation_speed * dt_secs);
        }
        let step = data.base_speed * self.speed_multiplier(data) * dt_secs;
        self.position = self.position.move_towards(self.destination, step);
    }

    /// Accrue repellent for `elapsed_secs` of gathering. With randomized
    /// gathering the rate for this stretch is drawn from
    /// `U(0.01, gathering_speed)`.
    pub fn gather(&mut self, elapsed_secs: f32, randomize: bool, rng: &mut GameRng) -> f32 {
        let rate = if randomize {
            rng.range_f32(0.01, self.gathering_speed)
        } else {
            self.gathering_speed
        };
        let gained = (rate * elapsed_secs).max(0.0);
        self.repellent += gained;
        gained
    }

    /// Award experience and rescale gathering on level-up.
    pub fn add_experience(&mut self, amount: u64, data: &FactionData) -> bool {
        let leveled = self.levels.add_experience(amount);
        if leveled {
            self.gathering_speed = data.max_gathering_speed * self.levels.progress();
        }
        leveled
    }

    /// Classify a health change against this agent's flee thresholds.
    pub fn wound_response(&self, change: HealthChange, data: &FactionData) -> WoundResponse {
        if !change.is_wound() {
            return WoundResponse::None;
        }
        let max = self.health.max();
        if change.to < max * data.strong_flee_fraction {
            WoundResponse::FleeToFriendly
        } else if change.to < max * data.weak_flee_fraction {
            if self.state == AgentState::Expand {
                WoundResponse::ContinueOrders
            } else {
                WoundResponse::FleeWithinHome
            }
        } else {
            WoundResponse::None
        }
    }

    /// Whether health has recovered enough to stop hiding or to volunteer
    /// for expansion.
    pub fn is_recovered(&self, data: &FactionData) -> bool {
        self.health.at_least(data.recovered_fraction)
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
