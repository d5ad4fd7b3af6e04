// Error types for the simulation crate.
//
// Only boundary operations return errors: config loading, priority
// conversion from raw UI values, director construction and explicit spawn
// requests. Inside the running sim, "an agent gave up and left the city" is
// gameplay, not an error, and rejected commands are logged and dropped.

use crate::types::Faction;
use thiserror::Error;

/// Everything that can go wrong at the simulation's boundary.
#[derive(Debug, Error)]
pub enum SimError {
    /// A raw priority value outside `Low..=Breed`.
    #[error("invalid priority value {0}")]
    InvalidPriority(u8),

    /// An operation that needs a real side was given `Neutral`.
    #[error("faction {0} is not supported here")]
    UnsupportedFaction(Faction),

    /// Coordinates outside the grid, or a vacant cell.
    #[error("no block at ({x}, {y})")]
    BlockOutOfBounds { x: i32, y: i32 },

    /// Config parsed but failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type SimResult<T> = Result<T, SimError>;
