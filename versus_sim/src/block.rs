// A city block: the unit of territorial contest.
//
// Each block owns the ground truth of who lives there (one roster per
// faction), the priority each faction's director has put on it, and the
// throttled dominance computation that closes the feedback loop:
//
//   agents move in/out → rosters change → throttled refresh recomputes
//   influence → dominance flips notify the directors → directors set
//   priorities → agents read priorities on their next decision.
//
// Rosters hold `AgentId`s, never agent data. A roster entry is the
// authoritative "home" record; the agent's own `home_block` field is a
// lookup that must agree with it. Anything iterating a roster must tolerate
// IDs whose agent has since been destroyed (the sim removes roster entries
// before announcing a death, but callers holding a copied list may be
// stale).
//
// Influence: 0.5 when the rosters are level, moving linearly toward 1.0 as
// dogs lead and toward 0.0 as cats lead, reaching the end of the scale once
// the lead equals `faction_members_for_dominance`. `≤ 0.1` is Cat-dominant,
// `≥ 0.9` Dog-dominant, otherwise Neutral.
//
// See also: `grid.rs` for the city that owns blocks, `director.rs` for the
// priority heuristic, `sim.rs` for add/remove with their side effects.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use versus_prng::GameRng;

/// Influence at or below this is Cat-dominant.
pub const CAT_DOMINANCE_INFLUENCE: f32 = 0.1;
/// Influence at or above this is Dog-dominant.
pub const DOG_DOMINANCE_INFLUENCE: f32 = 0.9;

/// What a refresh found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// `Some(previous)` when the dominant faction changed.
    pub dominance_changed_from: Option<Faction>,
    /// Rosters were touched since the previous refresh.
    pub roster_changed: bool,
}

impl RefreshOutcome {
    /// Directors should look at this block again.
    pub fn needs_review(&self) -> bool {
        self.roster_changed || self.dominance_changed_from.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub coord: BlockCoord,
    pub name: String,
    pub block_type: BlockType,
    /// World-space center of the footprint.
    pub center: WorldPos,
    /// Side length of the square footprint.
    pub size: f32,
    max_faction_members_supported: u32,
    cats: BTreeSet<AgentId>,
    dogs: BTreeSet<AgentId>,
    cat_priority: Priority,
    dog_priority: Priority,
    dominant: Faction,
    roster_dirty: bool,
    next_refresh_tick: u64,
    /// A human player is standing in this block.
    pub player_present: bool,
}

impl Block {
    pub fn new(
        coord: BlockCoord,
        name: String,
        block_type: BlockType,
        center: WorldPos,
        size: f32,
        max_faction_members_supported: u32,
    ) -> Self {
        Self {
            coord,
            name,
            block_type,
            center,
            size,
            max_faction_members_supported,
            cats: BTreeSet::new(),
            dogs: BTreeSet::new(),
            cat_priority: Priority::Medium,
            dog_priority: Priority::Medium,
            dominant: Faction::Neutral,
            roster_dirty: false,
            next_refresh_tick: 0,
            player_present: false,
        }
    }

    /// Capacity this block adds to its dominant faction.
    pub fn faction_members_supported(&self) -> u32 {
        self.max_faction_members_supported
    }

    /// Member lead a faction needs for full dominance.
    pub fn faction_members_for_dominance(&self) -> u32 {
        self.max_faction_members_supported / 2
    }

    // -----------------------------------------------------------------------
    // Rosters
    // -----------------------------------------------------------------------

    /// The roster for a faction; `None` for `Neutral`.
    pub fn members(&self, faction: Faction) -> Option<&BTreeSet<AgentId>> {
        match faction {
            Faction::Cat => Some(&self.cats),
            Faction::Dog => Some(&self.dogs),
            Faction::Neutral => None,
        }
    }

    /// The roster of whoever is hostile to `faction`.
    pub fn enemies_of(&self, faction: Faction) -> Option<&BTreeSet<AgentId>> {
        faction.enemy().and_then(|enemy| self.members(enemy))
    }

    pub fn count(&self, faction: Faction) -> usize {
        self.members(faction).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, agent_id: AgentId, faction: Faction) -> bool {
        self.members(faction)
            .is_some_and(|roster| roster.contains(&agent_id))
    }

    /// Add to the faction roster. Returns `false` (and changes nothing) if
    /// already present or if the faction has no roster.
    pub fn insert(&mut self, agent_id: AgentId, faction: Faction) -> bool {
        let roster = match faction {
            Faction::Cat => &mut self.cats,
            Faction::Dog => &mut self.dogs,
            Faction::Neutral => return false,
        };
        let added = roster.insert(agent_id);
        self.roster_dirty |= added;
        added
    }

    /// Remove from the faction roster. Returns whether it was present.
    pub fn remove(&mut self, agent_id: AgentId, faction: Faction) -> bool {
        let roster = match faction {
            Faction::Cat => &mut self.cats,
            Faction::Dog => &mut self.dogs,
            Faction::Neutral => return false,
        };
        let removed = roster.remove(&agent_id);
        self.roster_dirty |= removed;
        removed
    }

    // -----------------------------------------------------------------------
    // Influence and dominance
    // -----------------------------------------------------------------------

    /// Live influence from the current rosters. Always in [0, 1].
    pub fn normalized_faction_influence(&self) -> f32 {
        let dogs = self.dogs.len();
        let cats = self.cats.len();
        let for_dominance = self.faction_members_for_dominance().max(1) as f32;
        if dogs == cats {
            0.5
        } else if dogs > cats {
            let lead = (dogs - cats) as f32 / for_dominance;
            (0.5 + lead / 2.0).clamp(0.0, 1.0)
        } else {
            let lead = (cats - dogs) as f32 / for_dominance;
            (0.5 - lead / 2.0).clamp(0.0, 1.0)
        }
    }

    /// Dominance implied by the live rosters.
    pub fn current_dominance(&self) -> Faction {
        let influence = self.normalized_faction_influence();
        if influence <= CAT_DOMINANCE_INFLUENCE {
            Faction::Cat
        } else if influence >= DOG_DOMINANCE_INFLUENCE {
            Faction::Dog
        } else {
            Faction::Neutral
        }
    }

    /// Dominance as of the last refresh. This is what agents and the
    /// capacity ledger act on.
    pub fn dominant_faction(&self) -> Faction {
        self.dominant
    }

    /// Recompute dominance if the throttle allows. `None` means the refresh
    /// was skipped because `now` is before the next allowed tick.
    pub fn refresh(&mut self, now: u64, interval_ticks: u64) -> Option<RefreshOutcome> {
        if now < self.next_refresh_tick {
            return None;
        }
        self.next_refresh_tick = now + interval_ticks;

        let previous = self.dominant;
        self.dominant = self.current_dominance();
        let roster_changed = std::mem::take(&mut self.roster_dirty);
        Some(RefreshOutcome {
            dominance_changed_from: (previous != self.dominant).then_some(previous),
            roster_changed,
        })
    }

    // -----------------------------------------------------------------------
    // Priority
    // -----------------------------------------------------------------------

    /// A faction's priority for this block. `Neutral` has none and reads as
    /// `Medium`.
    pub fn priority(&self, faction: Faction) -> Priority {
        match faction {
            Faction::Cat => self.cat_priority,
            Faction::Dog => self.dog_priority,
            Faction::Neutral => Priority::Medium,
        }
    }

    /// Store a faction's priority. Ignored for `Neutral`.
    pub fn set_priority(&mut self, faction: Faction, priority: Priority) {
        match faction {
            Faction::Cat => self.cat_priority = priority,
            Faction::Dog => self.dog_priority = priority,
            Faction::Neutral => {}
        }
    }

    // -----------------------------------------------------------------------
    // Space
    // -----------------------------------------------------------------------

    /// Uniform point within the footprint. Obstacles inside the block are
    /// not considered.
    pub fn random_point(&self, rng: &mut GameRng) -> WorldPos {
        let half = self.size / 2.0;
        WorldPos::new(
            self.center.x + rng.range_f32(-half, half),
            self.center.z + rng.range_f32(-half, half),
        )
    }

    /// Whether a world position lies inside the footprint (edges inclusive).
    pub fn contains_point(&self, pos: WorldPos) -> bool {
        let half = self.size / 2.0;
        (pos.x - self.center.x).abs() <= half && (pos.z - self.center.z).abs() <= half
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(max_supported: u32) -> Block {
        Block::new(
            BlockCoord::new(2, 3),
            "Suburb 7".into(),
            BlockType::Suburban,
            WorldPos::new(240.0, 360.0),
            100.0,
            max_supported,
        )
    }

    fn fill(block: &mut Block, faction: Faction, first_id: u32, n: u32) {
        for i in 0..n {
            block.insert(AgentId(first_id + i), faction);
        }
    }

    #[test]
    fn empty_block_is_neutral_half() {
        let b = block(10);
        assert_eq!(b.normalized_faction_influence(), 0.5);
        assert_eq!(b.current_dominance(), Faction::Neutral);
    }

    #[test]
    fn five_dogs_clamp_to_full_dog_influence() {
        let mut b = block(10);
        assert_eq!(b.faction_members_for_dominance(), 5);
        fill(&mut b, Faction::Dog, 0, 5);
        assert_eq!(b.normalized_faction_influence(), 1.0);
        assert_eq!(b.current_dominance(), Faction::Dog);

        fill(&mut b, Faction::Dog, 100, 20);
        assert_eq!(b.normalized_faction_influence(), 1.0);
    }

    #[test]
    fn cat_lead_moves_influence_down() {
        let mut b = block(10);
        fill(&mut b, Faction::Cat, 0, 3);
        fill(&mut b, Faction::Dog, 100, 1);
        // Lead of 2 over a dominance requirement of 5: 0.5 - 0.2
        assert!((b.normalized_faction_influence() - 0.3).abs() < 1e-6);
        assert_eq!(b.current_dominance(), Faction::Neutral);
        fill(&mut b, Faction::Cat, 10, 3);
        assert_eq!(b.current_dominance(), Faction::Cat);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut b = block(10);
        assert!(b.insert(AgentId(1), Faction::Cat));
        assert!(!b.insert(AgentId(1), Faction::Cat));
        assert_eq!(b.count(Faction::Cat), 1);
        assert!(!b.insert(AgentId(2), Faction::Neutral));
    }

    #[test]
    fn refresh_is_throttled_and_reports_dominance_change() {
        let mut b = block(4);
        fill(&mut b, Faction::Dog, 0, 2);
        let outcome = b.refresh(0, 1000).unwrap();
        assert_eq!(outcome.dominance_changed_from, Some(Faction::Neutral));
        assert!(outcome.roster_changed);
        assert_eq!(b.dominant_faction(), Faction::Dog);

        b.remove(AgentId(0), Faction::Dog);
        assert!(b.refresh(999, 1000).is_none(), "throttle not elapsed");
        assert_eq!(b.dominant_faction(), Faction::Dog, "skipped refresh changes nothing");

        let outcome = b.refresh(1000, 1000).unwrap();
        assert_eq!(outcome.dominance_changed_from, Some(Faction::Dog));
        assert_eq!(b.dominant_faction(), Faction::Neutral);

        let quiet = b.refresh(2000, 1000).unwrap();
        assert!(!quiet.needs_review());
    }

    #[test]
    fn priorities_are_per_faction() {
        let mut b = block(10);
        assert_eq!(b.priority(Faction::Cat), Priority::Medium);
        b.set_priority(Faction::Cat, Priority::High);
        b.set_priority(Faction::Neutral, Priority::Breed);
        assert_eq!(b.priority(Faction::Cat), Priority::High);
        assert_eq!(b.priority(Faction::Dog), Priority::Medium);
    }

    #[test]
    fn random_points_stay_inside_footprint() {
        let b = block(10);
        let mut rng = GameRng::new(9);
        for _ in 0..1000 {
            let p = b.random_point(&mut rng);
            assert!(b.contains_point(p), "{p} escaped {b}");
        }
    }

    #[test]
    fn enemies_are_the_other_roster() {
        let mut b = block(10);
        fill(&mut b, Faction::Dog, 0, 2);
        assert_eq!(b.enemies_of(Faction::Cat).map(BTreeSet::len), Some(2));
        assert_eq!(b.enemies_of(Faction::Dog).map(BTreeSet::len), Some(0));
        assert!(b.enemies_of(Faction::Neutral).is_none());
    }
}
