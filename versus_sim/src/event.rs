// Simulation events: the internal scheduling queue and the narrative log.
//
// The sim is a discrete event simulation. Agents, blocks and the movement
// frame schedule future work into a priority queue ordered by
// `(tick, sequence)`; `SimState::step` pops and processes them in order.
// This replaces per-object coroutines: an agent "waiting" between decisions
// is simply an `AgentDecision` entry further down the heap, and a destroyed
// agent's pending entry is dropped when it fires and finds nothing.
//
// Two related concepts live here:
// - `ScheduledEvent`: internal entries that drive the sim.
// - `VersusEvent`: player-visible narrative events (description plus
//   importance) returned from every step and fanned out to `EventSink`s.
//
// See also: `sim.rs` for the loop that consumes the queue and emits events.
//
// **Critical constraint: determinism.** `(tick, sequence)` is a total order,
// so two runs with the same seed and commands process events identically.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

// ---------------------------------------------------------------------------
// Internal scheduled events (priority queue)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub tick: u64,
    /// Tiebreak within a tick; lower fires first.
    pub sequence: u64,
    pub kind: ScheduledEventKind,
}

impl ScheduledEvent {
    fn key(&self) -> (u64, u64) {
        (self.tick, self.sequence)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduledEventKind {
    /// One decision evaluation for one agent.
    AgentDecision { agent_id: AgentId },
    /// Movement, rotation, health recharge, mine triggers and containment
    /// for every live agent.
    Frame,
    /// Throttled influence and dominance recompute for one block.
    BlockRefresh { coord: BlockCoord },
    /// A dropped ammo pickup fades away.
    PickupExpired { pickup_id: PickupId },
}

// Entries compare by `(tick, sequence)` alone; the queue wraps them in
// `Reverse` to pop the smallest key first.
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Min-heap of scheduled events.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, tick: u64, kind: ScheduledEventKind) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(ScheduledEvent {
            tick,
            sequence,
            kind,
        }));
    }

    pub fn peek_tick(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.tick)
    }

    /// Pop the next event if it is due at or before `up_to_tick`.
    pub fn pop_if_ready(&mut self, up_to_tick: u64) -> Option<ScheduledEvent> {
        let Reverse(next) = self.heap.peek()?;
        if next.tick > up_to_tick {
            return None;
        }
        self.heap.pop().map(|Reverse(e)| e)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Narrative events (output)
// ---------------------------------------------------------------------------

/// A notification for the UI and log: what happened, and how much it matters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersusEvent {
    pub tick: u64,
    pub importance: Importance,
    pub description: String,
    pub kind: VersusEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VersusEventKind {
    /// A block's roster changed.
    BlockUpdated { coord: BlockCoord },
    /// A block's dominant faction flipped.
    BlockDominanceChanged {
        coord: BlockCoord,
        previous: Faction,
        current: Faction,
    },
    /// Something an agent did or suffered.
    AnimalAction { agent_id: AgentId },
    /// An agent left the city for good.
    AnimalLeftCity { agent_id: AgentId, faction: Faction },
    /// An agent hit the human player; the FPS layer applies the damage.
    PlayerDamaged { agent_id: AgentId, amount: f32 },
}

impl VersusEventKind {
    /// Short type label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            VersusEventKind::BlockUpdated { .. } => "BlockUpdated",
            VersusEventKind::BlockDominanceChanged { .. } => "BlockDominanceChanged",
            VersusEventKind::AnimalAction { .. } => "AnimalAction",
            VersusEventKind::AnimalLeftCity { .. } => "AnimalLeftCity",
            VersusEventKind::PlayerDamaged { .. } => "PlayerDamaged",
        }
    }
}

/// Anything that wants to hear about narrative events. Fire-and-forget: no
/// acknowledgement, no backpressure.
pub trait EventSink {
    fn on_event(&mut self, event: &VersusEvent);
}

/// Console sink: forwards events at or above a minimum importance to
/// `tracing` and counts what it forwarded.
#[derive(Clone, Debug)]
pub struct EventLog {
    min_importance: Importance,
    forwarded: usize,
}

impl EventLog {
    pub fn new(min_importance: Importance) -> Self {
        Self {
            min_importance,
            forwarded: 0,
        }
    }

    pub fn accepts(&self, event: &VersusEvent) -> bool {
        event.importance >= self.min_importance
    }

    /// Events forwarded so far.
    pub fn forwarded(&self) -> usize {
        self.forwarded
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &VersusEvent) {
        if !self.accepts(event) {
            return;
        }
        self.forwarded += 1;
        let label = event.kind.label();
        match event.importance {
            Importance::High => {
                tracing::warn!(tick = event.tick, kind = label, "{}", event.description)
            }
            _ => tracing::info!(tick = event.tick, kind = label, "{}", event.description),
        }
    }
}
