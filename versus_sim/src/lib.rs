// versus_sim: pure Rust simulation library for the cats-versus-dogs city.
//
// This crate contains all simulation logic for the territorial game: the
// block grid, animal agents and their state machine, the per-faction
// directors, combat (health, mines, ammo pickups), event scheduling and the
// command interface. It has no rendering or engine dependencies and can be
// tested, benchmarked and run headless.
//
// Module overview:
// - `sim.rs`:       Top-level SimState, tick loop, command/event processing, entity lifecycle.
// - `behavior.rs`:  The agent decision state machine (idle, gather, place, flee, hide, attack, expand, breed).
// - `agent.rs`:     Agent data plus per-agent mechanics (movement, gathering, wound classification).
// - `block.rs`:     One city block: faction rosters, influence, dominance, priorities.
// - `grid.rs`:      City generation, block lookup, neighbors and the diamond ring search.
// - `director.rs`:  Per-faction strategic director that rates blocks Low/Medium/High/Breed.
// - `command.rs`:   SimCommand / SimAction, all external sim mutations.
// - `event.rs`:     EventQueue (priority queue), narrative VersusEvents and event sinks.
// - `config.rs`:    GameConfig, every tunable, loaded from JSON.
// - `faction.rs`:   FactionData, data-driven per-faction behavior.
// - `health.rs`:    Recharging health.
// - `leveling.rs`:  Experience curve and levels.
// - `error.rs`:     SimError / SimResult.
// - `prng`:         Re-exported from `versus_prng`: xoshiro256++ PRNG with SplitMix64 seeding.
// - `types.rs`:     BlockCoord, WorldPos, entity IDs, Faction, Priority, AgentState.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands) -> (new_state, events)`. All randomness comes from the
// seeded PRNG in `versus_prng`. No `HashMap`, no system time, no OS entropy.
// Use `BTreeMap` for ordered collections.

pub mod agent;
mod behavior;
pub mod block;
pub mod command;
pub mod config;
pub mod director;
pub mod error;
pub mod event;
pub mod faction;
pub mod grid;
pub mod health;
pub mod leveling;
pub use versus_prng as prng;
pub mod sim;
pub mod types;
