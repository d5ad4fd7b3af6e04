// Per-faction strategic director.
//
// One `Director` per playable faction, owned by `SimState` for the whole
// game. When a block's refresh reports activity (`RefreshOutcome::
// needs_review`), each director re-rates that block for its own faction:
//
//   1. A block currently High for us gives its slot back first; it is
//      re-rated from scratch.
//   2. Lead ≥ threshold, no enemies       → Breed.
//   3. Friends ≥ threshold and outnumbering the enemies present → Medium
//      (hold). A full garrison holds even when the lead itself has
//      narrowed; an outnumbered one falls through to the roll.
//   4. Deficit ≥ threshold, no friends    → Low (write off), or with
//      `contest_lost_blocks` roll to contest it as in 5.
//   5. Anything else                      → roll against the block's
//      importance; High if the roll succeeds and a slot is free, else
//      Medium.
//
// The threshold is the block's `faction_members_for_dominance`. Importance
// is `1 − manhattan(home, block) / (W − 1 + D − 1)` scaled by
// `importance_scale`: blocks near the faction's home corner matter more.
// Cats are at home in the `(0, 0)` corner, dogs in the opposite one.
//
// Cap: `high_priority.len() <= max_high_priority` at all times. Every path
// that writes High for this faction, the player override included, goes
// through here so the cap holds regardless of who asked.
//
// See also: `block.rs` for priority storage, `sim.rs` for when directors are
// consulted.

use crate::block::Block;
use crate::config::DirectorConfig;
use crate::error::SimResult;
use crate::grid::City;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use versus_prng::GameRng;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Director {
    faction: Faction,
    /// Corner the importance rating is measured from.
    home: BlockCoord,
    /// Normalizer for the importance rating, `W − 1 + D − 1`.
    span: u32,
    high_priority: BTreeSet<BlockCoord>,
}

impl Director {
    /// A director for a playable faction. `Neutral` has no strategy.
    pub fn new(faction: Faction, city: &City) -> SimResult<Self> {
        let faction = faction.require_playable()?;
        let home = match faction {
            Faction::Dog => BlockCoord::new(city.width() - 1, city.depth() - 1),
            _ => BlockCoord::new(0, 0),
        };
        let span = ((city.width() - 1) + (city.depth() - 1)).max(0) as u32;
        Ok(Self {
            faction,
            home,
            span,
            high_priority: BTreeSet::new(),
        })
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn home(&self) -> BlockCoord {
        self.home
    }

    /// Blocks currently held at High, in coordinate order.
    pub fn high_priority_blocks(&self) -> &BTreeSet<BlockCoord> {
        &self.high_priority
    }

    pub fn high_priority_count(&self) -> usize {
        self.high_priority.len()
    }

    /// Strategic value of a block in `[0, importance_scale]`.
    pub fn importance(&self, coord: BlockCoord, config: &DirectorConfig) -> f32 {
        let proximity = if self.span == 0 {
            1.0
        } else {
            1.0 - coord.manhattan_distance(self.home) as f32 / self.span as f32
        };
        proximity.clamp(0.0, 1.0) * config.importance_scale
    }

    /// Re-rate `block` for this faction and store the result on it.
    pub fn evaluate(
        &mut self,
        block: &mut Block,
        config: &DirectorConfig,
        rng: &mut GameRng,
    ) -> Priority {
        let coord = block.coord;
        self.high_priority.remove(&coord);

        let friends = block.count(self.faction) as i64;
        let enemies = self
            .faction
            .enemy()
            .map_or(0, |enemy| block.count(enemy)) as i64;
        let threshold = i64::from(block.faction_members_for_dominance());

        let priority = if enemies == 0 && friends >= threshold {
            Priority::Breed
        } else if enemies > 0 && friends >= threshold && friends > enemies {
            Priority::Medium
        } else if enemies - friends >= threshold && friends == 0 && !config.contest_lost_blocks {
            Priority::Low
        } else {
            self.roll_for_high(coord, config, rng)
        };

        block.set_priority(self.faction, priority);
        priority
    }

    fn roll_for_high(
        &mut self,
        coord: BlockCoord,
        config: &DirectorConfig,
        rng: &mut GameRng,
    ) -> Priority {
        let importance = self.importance(coord, config);
        if rng.chance(importance) && self.high_priority.len() < config.max_high_priority {
            self.high_priority.insert(coord);
            Priority::High
        } else {
            Priority::Medium
        }
    }

    /// Apply an outside priority override (the top-down UI). Returns `false`
    /// and leaves the block untouched when it would push this director over
    /// its High budget.
    pub fn request_priority(
        &mut self,
        block: &mut Block,
        priority: Priority,
        config: &DirectorConfig,
    ) -> bool {
        let coord = block.coord;
        if priority == Priority::High {
            if !self.high_priority.contains(&coord)
                && self.high_priority.len() >= config.max_high_priority
            {
                return false;
            }
            self.high_priority.insert(coord);
        } else {
            self.high_priority.remove(&coord);
        }
        block.set_priority(self.faction, priority);
        true
    }
}
