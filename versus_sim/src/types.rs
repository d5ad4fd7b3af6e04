// Core types shared across the simulation.
//
// Grid coordinates (`BlockCoord`), world-space positions (`WorldPos`), compact
// entity IDs, and the small enums every module speaks: `Faction`, `Priority`,
// `AgentState`, `Importance`, `BlockType`. All derive serde so configs,
// commands and narrative events can cross the JSON boundary.
//
// World space is the ground plane: `x` runs along block columns, `z` along
// block rows. Height is not simulated.
//
// **Critical constraint: determinism.** Everything here is `Ord` where it is
// used as a map key so iteration order is stable.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// Integer coordinates of a block in the city grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
}

impl BlockCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two blocks.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A point on the ground plane, in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn sqr_distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        dx * dx + dz * dz
    }

    pub fn distance(self, other: Self) -> f32 {
        self.sqr_distance(other).sqrt()
    }

    /// Step toward `target` by at most `max_step`. Lands exactly on the
    /// target when it is within reach, so arrival checks can compare the
    /// squared distance against zero.
    pub fn move_towards(self, target: Self, max_step: f32) -> Self {
        let dist = self.distance(target);
        if dist <= max_step || dist == 0.0 {
            return target;
        }
        let t = max_step / dist;
        Self {
            x: self.x + (target.x - self.x) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }

    /// Heading (radians, atan2 of z over x) from `self` toward `target`, or
    /// `None` when the points coincide.
    pub fn heading_to(self, target: Self) -> Option<f32> {
        let dx = target.x - self.x;
        let dz = target.z - self.z;
        if dx == 0.0 && dz == 0.0 {
            None
        } else {
            Some(dz.atan2(dx))
        }
    }
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.z)
    }
}

/// Rotate heading `current` toward `target` by at most `max_step` radians,
/// taking the short way around.
pub fn rotate_towards(current: f32, target: f32, max_step: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut delta = (target - current) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta < -PI {
        delta += TAU;
    }
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step * delta.signum()
    }
}

// ---------------------------------------------------------------------------
// Entity IDs, compact and allocated sequentially by the sim
// ---------------------------------------------------------------------------

macro_rules! compact_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

compact_id!(/// Identifier of an animal agent.
AgentId);
compact_id!(/// Identifier of a placed repellent mine.
MineId);
compact_id!(/// Identifier of a dropped repellent ammo pickup.
PickupId);

// ---------------------------------------------------------------------------
// Simulation enums
// ---------------------------------------------------------------------------

/// The sides contesting the city. `Neutral` is only ever a dominance
/// outcome; no agent or director may belong to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    Cat,
    Dog,
    Neutral,
}

impl Faction {
    /// Every faction, in ledger order.
    pub const ALL: [Faction; 3] = [Faction::Cat, Faction::Dog, Faction::Neutral];

    /// The opposing side, or `None` for `Neutral`.
    pub fn enemy(self) -> Option<Faction> {
        match self {
            Faction::Cat => Some(Faction::Dog),
            Faction::Dog => Some(Faction::Cat),
            Faction::Neutral => None,
        }
    }

    /// Index into per-faction ledgers.
    pub fn index(self) -> usize {
        match self {
            Faction::Cat => 0,
            Faction::Dog => 1,
            Faction::Neutral => 2,
        }
    }

    /// `Err(UnsupportedFaction)` for `Neutral`; agents and directors need a
    /// real side.
    pub fn require_playable(self) -> Result<Self, SimError> {
        match self {
            Faction::Neutral => Err(SimError::UnsupportedFaction(self)),
            f => Ok(f),
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Faction::Cat => "Cat",
            Faction::Dog => "Dog",
            Faction::Neutral => "Neutral",
        };
        f.write_str(name)
    }
}

/// Strategic label a director (or the player) puts on a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Breed,
}

impl Priority {
    /// The next priority in the UI toggle cycle, wrapping Breed back to Low.
    pub fn cycled(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Breed,
            Priority::Breed => Priority::Low,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = SimError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::Low),
            1 => Ok(Priority::Medium),
            2 => Ok(Priority::High),
            3 => Ok(Priority::Breed),
            other => Err(SimError::InvalidPriority(other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Breed => "Breed",
        };
        f.write_str(name)
    }
}

/// What an agent is currently doing. See `behavior.rs` for the transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    GatherRepellent,
    PlaceRepellentMine,
    Flee,
    Hide,
    Attack,
    Expand,
    Breed,
}

/// How loud a narrative event is. Sinks filter on a minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Medium,
    High,
}

/// Urban density of a block, decided by distance from the city center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Suburban,
    OuterCity,
    City,
    InnerCity,
}

impl BlockType {
    /// Display prefix for generated block names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            BlockType::Suburban => "Suburb",
            BlockType::OuterCity => "City Block",
            BlockType::City => "Inner City Block",
            BlockType::InnerCity => "Downtown Block",
        }
    }
}
