// Faction data: data-driven animal behavior.
//
// Cats and dogs run the same `Agent` state machine; everything that differs
// between them (speed, flee thresholds, breeding, combat numbers) is data in
// `FactionData`, keyed by `Faction` in `GameConfig::factions`. The agent code
// never branches on which faction it is, except for the FPS rule that dogs
// always go for a player in their block.
//
// Durations are authored in seconds and converted to ticks by the sim using
// `GameConfig::ticks_per_second`.
//
// See also: `config.rs` where the table lives, `behavior.rs` for the state
// machine that reads these values.

use serde::{Deserialize, Serialize};

/// Behavioral parameters for one faction's agents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FactionData {
    /// Walking speed in world units per second.
    pub base_speed: f32,
    /// Turn rate toward the movement direction, radians per second.
    pub rotation_speed: f32,
    /// Mean time between decision evaluations.
    pub decision_interval_secs: f32,
    /// Each agent's interval is `decision_interval_secs × U(1 − j, 1 + j)`.
    pub decision_jitter: f32,

    /// Below this fraction of max health, flee but stay in the home block.
    pub weak_flee_fraction: f32,
    /// Below this fraction of max health, flee to a friendly block or die.
    pub strong_flee_fraction: f32,
    /// Health fraction needed to stop hiding, and to volunteer for expansion.
    pub recovered_fraction: f32,

    /// Gathering rate at max level, repellent per second.
    pub max_gathering_speed: f32,
    /// If true, each gather tick draws its rate from `U(0.01, current)`.
    pub randomize_gathering_speed: bool,

    /// Per-idle-tick chance to start breeding on a Breed-priority block.
    pub breeding_chance: f32,
    /// Time spent in the Breed state before the litter is born.
    pub breeding_duration_secs: f32,
    /// Per-idle-tick chance to go and do something (gather or expand).
    pub idle_action_chance: f32,

    /// Distance at which an attack lands.
    pub attack_distance: f32,
    /// Cooldown between attacks.
    pub attack_interval_secs: f32,
    /// Damage per attack.
    pub damage: f32,
    /// How far from the home block center an attacker will chase. Enemies
    /// are engaged inside half of this.
    pub chase_distance: f32,

    pub health_max: f32,
    /// Health regained per second once recharge has kicked in.
    pub health_recharge_rate: f32,
    /// Quiet time after the last hit before recharge starts.
    pub health_recharge_delay_secs: f32,

    pub flee_speed_multiplier: f32,
    pub expand_speed_multiplier: f32,
    pub chase_speed_multiplier: f32,

    /// Ring radius limit for an idle agent looking for a High block.
    pub expand_range: i32,
    /// Ring radius limit for a newborn sent out to expand.
    pub newborn_expand_range: i32,
    /// Ring radius limit when searching for a friendly block to flee to.
    pub friendly_search_distance: i32,

    pub place_repellent_experience: u64,
    pub breed_experience: u64,
}

impl FactionData {
    /// Tuning shared by both factions out of the box.
    pub fn standard() -> Self {
        Self {
            base_speed: 2.0,
            rotation_speed: 6.0,
            decision_interval_secs: 0.25,
            decision_jitter: 0.1,
            weak_flee_fraction: 0.5,
            strong_flee_fraction: 0.15,
            recovered_fraction: 0.8,
            max_gathering_speed: 6.0,
            randomize_gathering_speed: true,
            breeding_chance: 0.02,
            breeding_duration_secs: 30.0,
            idle_action_chance: 0.02,
            attack_distance: 1.0,
            attack_interval_secs: 1.2,
            damage: 7.5,
            chase_distance: 100.0,
            health_max: 100.0,
            health_recharge_rate: 5.0,
            health_recharge_delay_secs: 4.0,
            flee_speed_multiplier: 2.0,
            expand_speed_multiplier: 1.5,
            chase_speed_multiplier: 2.0,
            expand_range: 3,
            newborn_expand_range: 100,
            friendly_search_distance: 7,
            place_repellent_experience: 2,
            breed_experience: 1,
        }
    }
}
