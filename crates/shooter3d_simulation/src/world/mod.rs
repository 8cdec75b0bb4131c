//! Static world: геометрия уровня и её построение
//!
//! - level: `Level` resource (triangles, bounds, LOS, raycast)
//! - arena: карта матча и плоский уровень для тестов

pub mod arena;
pub mod level;

pub use arena::{arena_layout, build_arena, build_flat, ArenaObject, ArenaObjectKind};
pub use level::{Level, RayHit};

use serde::{Deserialize, Serialize};

use crate::error::SimulationResult;

/// Какой уровень строить в Loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LevelSource {
    /// Полная арена; деревья из seed матча
    Arena,
    /// Только земля `2 × half_extent` на сторону
    Flat { half_extent: f32 },
}

impl Default for LevelSource {
    fn default() -> Self {
        Self::Arena
    }
}

impl LevelSource {
    pub fn build(&self, seed: u64) -> SimulationResult<Level> {
        match self {
            LevelSource::Arena => build_arena(seed),
            LevelSource::Flat { half_extent } => build_flat(*half_extent),
        }
    }
}
