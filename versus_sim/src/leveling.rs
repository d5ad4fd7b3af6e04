// Experience and level progression.
//
// A gentle cubic curve: each level needs a little more than the last. The
// agent listens for the level-up reported by `add_experience` and rescales
// its gathering speed to `max_speed × level / max_level`.

use serde::{Deserialize, Serialize};

/// Experience needed to leave `level`.
///
/// `floor(0.04·(level+1)³ + 0.8·(level+1)² + 2·level + 1)`
pub fn experience_needed(level: u32) -> u64 {
    let next = f64::from(level) + 1.0;
    let xp = 0.04 * next.powi(3) + 0.8 * next.powi(2) + 2.0 * f64::from(level) + 1.0;
    xp.floor() as u64
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelSystem {
    experience: u64,
    level: u32,
    max_level: u32,
}

impl LevelSystem {
    pub fn new(max_level: u32) -> Self {
        Self {
            experience: 0,
            level: 0,
            max_level,
        }
    }

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// `level / max_level`, the scale applied to gathering speed.
    pub fn progress(&self) -> f32 {
        self.level as f32 / self.max_level as f32
    }

    /// Add experience. Returns `true` when this pushed the total past the
    /// current level's threshold and the level went up (at most one level
    /// per call, never past `max_level`).
    pub fn add_experience(&mut self, amount: u64) -> bool {
        self.experience += amount;
        if self.level < self.max_level && self.experience > experience_needed(self.level) {
            self.level += 1;
            true
        } else {
            false
        }
    }
}
