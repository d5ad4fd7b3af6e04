// Data-driven game configuration.
//
// Every tunable lives in `GameConfig`, loaded from JSON by the headless
// runner or built with `GameConfig::default()`. The sim reads numbers from
// here rather than hard-coding them: clock rate, city shape, per-faction
// behavior (`FactionData`), repellent costs, director budget and the level
// curve cap.
//
// `from_json` parses and then validates; a config that would divide by zero
// or leave a faction without behavior data is rejected up front.
//
// See also: `faction.rs` for `FactionData`, `sim.rs` which owns the config
// as part of `SimState`.
//
// **Critical constraint: determinism.** Identical configs and seeds produce
// identical games.

use crate::error::{SimError, SimResult};
use crate::faction::FactionData;
use crate::types::Faction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// City shape and block-level constants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CityConfig {
    /// Blocks along x.
    pub width: i32,
    /// Blocks along y.
    pub depth: i32,
    /// Side length of a square block footprint, world units.
    pub block_size: f32,
    /// Road width on each side of a block.
    pub road_width: f32,
    /// Capacity each block contributes to its dominant faction. Half of it
    /// is the member lead needed for dominance.
    pub max_faction_members_supported: u32,
    /// Throttle for influence/dominance recomputation.
    pub influence_update_interval_secs: f32,
    /// Seed the city with animals at construction.
    pub populate: bool,
    /// Upper bound multiplier for the per-block seeding roll.
    pub seed_population_scale: f32,
}

/// Costs and effects of the repellent weapons agents craft.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepellentConfig {
    /// Repellent needed to craft a mine.
    pub mine_cost: f32,
    /// Repellent needed for each ammo pickup kind. Pickups are only dropped
    /// while a player occupies the block.
    pub pickup_costs: Vec<f32>,
    /// A repelled agent this close sets the mine off.
    pub trigger_radius: f32,
    /// Repelled agents this close take the blast.
    pub blast_radius: f32,
    pub mine_damage: f32,
    /// Lifetime of an uncollected pickup.
    pub pickup_ttl_secs: f32,
}

impl RepellentConfig {
    /// The cheapest thing an agent can craft; an idle agent holding at least
    /// this much goes to place it.
    pub fn min_cost(&self) -> f32 {
        self.pickup_costs
            .iter()
            .copied()
            .fold(self.mine_cost, f32::min)
    }
}

/// Strategic budget for the per-faction directors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Most blocks a director may hold at High at once.
    pub max_high_priority: usize,
    /// When a block is lost outright, roll to contest it instead of writing
    /// it off as Low.
    pub contest_lost_blocks: bool,
    /// Scales the distance-based importance rating into a High probability.
    pub importance_scale: f32,
}

/// Progression limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelConfig {
    pub max_level: u32,
}

/// All tunable simulation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Ticks per simulated second.
    pub ticks_per_second: u64,
    /// Ticks between movement frames.
    pub frame_interval_ticks: u64,
    pub city: CityConfig,
    pub repellent: RepellentConfig,
    pub director: DirectorConfig,
    pub levels: LevelConfig,
    /// Behavior table. Must contain `Cat` and `Dog`.
    pub factions: BTreeMap<Faction, FactionData>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut factions = BTreeMap::new();
        factions.insert(Faction::Cat, FactionData::standard());
        factions.insert(Faction::Dog, FactionData::standard());

        Self {
            ticks_per_second: 1000,
            frame_interval_ticks: 20,
            city: CityConfig {
                width: 15,
                depth: 15,
                block_size: 100.0,
                road_width: 10.0,
                max_faction_members_supported: 10,
                influence_update_interval_secs: 1.0,
                populate: true,
                seed_population_scale: 10.0,
            },
            repellent: RepellentConfig {
                mine_cost: 10.0,
                pickup_costs: vec![8.0, 12.0],
                trigger_radius: 1.5,
                blast_radius: 5.0,
                mine_damage: 50.0,
                pickup_ttl_secs: 10.0,
            },
            director: DirectorConfig {
                max_high_priority: 3,
                contest_lost_blocks: true,
                importance_scale: 0.5,
            },
            levels: LevelConfig { max_level: 100 },
            factions,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject configs the sim cannot run.
    pub fn validate(&self) -> SimResult<()> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_owned()));
        if self.ticks_per_second == 0 || self.frame_interval_ticks == 0 {
            return invalid("ticks_per_second and frame_interval_ticks must be positive");
        }
        if self.city.width <= 0 || self.city.depth <= 0 {
            return invalid("city must be at least 1x1");
        }
        if self.city.max_faction_members_supported < 2 {
            return invalid("max_faction_members_supported must be at least 2");
        }
        if self.city.influence_update_interval_secs <= 0.0 {
            return invalid("influence_update_interval_secs must be positive");
        }
        for faction in [Faction::Cat, Faction::Dog] {
            let Some(data) = self.factions.get(&faction) else {
                return Err(SimError::InvalidConfig(format!(
                    "missing faction data for {faction}"
                )));
            };
            if data.decision_interval_secs <= 0.0 || data.health_max <= 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{faction}: decision interval and health max must be positive"
                )));
            }
            if !(0.0..1.0).contains(&data.decision_jitter) {
                return Err(SimError::InvalidConfig(format!(
                    "{faction}: decision_jitter must be in [0, 1)"
                )));
            }
        }
        if self.levels.max_level == 0 {
            return invalid("max_level must be positive");
        }
        Ok(())
    }

    /// Behavior data for a faction. Only valid for factions the config was
    /// validated with.
    pub fn faction(&self, faction: Faction) -> Option<&FactionData> {
        self.factions.get(&faction)
    }

    /// Convert seconds to the nearest tick count. A positive duration is
    /// never zero ticks.
    pub fn secs_to_ticks(&self, secs: f32) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        ((secs as f64 * self.ticks_per_second as f64).round() as u64).max(1)
    }

    /// Convert ticks to seconds.
    pub fn ticks_to_secs(&self, ticks: u64) -> f32 {
        ticks as f32 / self.ticks_per_second as f32
    }
}
