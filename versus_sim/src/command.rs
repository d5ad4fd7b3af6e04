// Commands that mutate simulation state from outside.
//
// Everything the surrounding game does to the sim goes through `SimCommand`:
// the top-down UI overriding block priorities, the FPS layer reporting
// where the player is and what their weapons hit, and spawn requests. The
// sim is a pure function `(state, commands) -> (new_state, events)`.
//
// Commands that cannot be applied (unknown agent, vacant or out-of-range
// block, a Neutral spawn, a High override past the director's budget) are
// dropped with a `tracing::warn!` diagnostic. They never fail the step.
//
// See also: `sim.rs` for `apply_command()` which dispatches these.
//
// **Critical constraint: determinism.** Commands are the only external
// input. Internal state changes come from scheduled events (`event.rs`).

use crate::types::*;
use serde::{Deserialize, Serialize};

/// A command to apply at a specific tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimCommand {
    pub tick: u64,
    pub action: SimAction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SimAction {
    /// Override a faction's priority for a block.
    SetPriority {
        coord: BlockCoord,
        faction: Faction,
        priority: Priority,
    },
    /// Advance a block's priority one step through Low → Medium → High →
    /// Breed → Low.
    CyclePriority { coord: BlockCoord, faction: Faction },
    /// Spawn a new agent in a block.
    SpawnAgent { faction: Faction, coord: BlockCoord },
    /// Deal damage to an agent (player weapons).
    DamageAgent { agent_id: AgentId, amount: f32 },
    /// The player dropped into a block in FPS mode.
    PlayerEnterBlock { coord: BlockCoord, position: WorldPos },
    /// The player moved. Crossing into another block moves their presence.
    PlayerMove { position: WorldPos },
    /// The player left FPS mode.
    PlayerExitBlock,
}
