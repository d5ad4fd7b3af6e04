// Health capability owned by each agent.
//
// Current/max health, damage application that reports the transition, and
// recharge after a quiet period since the last hit. The agent state machine
// reacts to the `HealthChange` values this returns; it never reaches into
// the numbers directly, which keeps the flee logic testable on its own.
//
// Invariant: `0 <= current <= max` after every operation.

use serde::{Deserialize, Serialize};

/// Outcome of a damage application.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthChange {
    pub from: f32,
    pub to: f32,
    /// The hit left the owner below the critical fraction.
    pub critical: bool,
}

impl HealthChange {
    /// True when health went down but the owner is still standing.
    pub fn is_wound(&self) -> bool {
        self.to < self.from && self.to > 0.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
    /// Fraction of `max` below which a hit is reported as critical.
    critical_fraction: f32,
    /// Health per second regained once recharge starts.
    recharge_rate: f32,
    /// Ticks after the last hit before recharge starts.
    recharge_delay_ticks: u64,
    last_damage_tick: Option<u64>,
}

impl Health {
    pub fn new(max: f32, recharge_rate: f32, recharge_delay_ticks: u64) -> Self {
        Self {
            current: max,
            max,
            critical_fraction: 0.25,
            recharge_rate,
            recharge_delay_ticks,
            last_damage_tick: None,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// `current >= fraction × max`.
    pub fn at_least(&self, fraction: f32) -> bool {
        self.current >= self.max * fraction
    }

    /// Subtract `amount` (clamped at zero) and report the change.
    pub fn apply_damage(&mut self, amount: f32, now: u64) -> HealthChange {
        let from = self.current;
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        self.last_damage_tick = Some(now);
        HealthChange {
            from,
            to: self.current,
            critical: self.current < self.max * self.critical_fraction,
        }
    }

    /// Force a value, clamped into range. Used to stand a defeated agent
    /// back up at 1.
    pub fn set(&mut self, value: f32) {
        self.current = value.clamp(0.0, self.max);
    }

    /// Regain health for `dt_secs` if the recharge delay has elapsed.
    /// Defeated owners do not recharge; they are stood back up explicitly.
    pub fn recharge(&mut self, now: u64, dt_secs: f32) {
        if !self.is_alive() || self.current >= self.max {
            return;
        }
        let ready = self
            .last_damage_tick
            .is_none_or(|hit| now >= hit + self.recharge_delay_ticks);
        if ready {
            self.current = (self.current + self.recharge_rate * dt_secs).min(self.max);
        }
    }
}
