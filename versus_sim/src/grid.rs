// The city: a fixed `width × depth` grid of blocks.
//
// Generated once at sim construction and never resized. Each cell is either
// a `Block` or vacant (a configured hole); the generator in this crate never
// leaves holes, but every lookup treats vacancy as "no block" rather than
// assuming a dense grid.
//
// Layout: block `(x, y)` is centered at world `(x·pitch, y·pitch)` where
// `pitch = block_size + 2·road_width`. Density (`BlockType`) falls off with
// distance from the city center.
//
// The ring search is the spatial primitive agents use to find somewhere to
// go: outward by Manhattan ring, two mirrored diagonal edges per ring, first
// match wins. It is deterministic: no RNG, no distance tie-breaking within a
// ring.
//
// See also: `block.rs`, `behavior.rs` for the two searches built on
// `ring_search`, `sim.rs` for population seeding.

use crate::block::Block;
use crate::config::CityConfig;
use crate::error::{SimError, SimResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct City {
    width: i32,
    depth: i32,
    /// Center-to-center spacing of adjacent blocks.
    pitch: f32,
    /// Row-major, `y * width + x`.
    cells: Vec<Option<Block>>,
}

impl City {
    /// Lay out every block of the grid.
    pub fn generate(config: &CityConfig) -> Self {
        let pitch = config.block_size + 2.0 * config.road_width;
        let center = WorldPos::new(
            pitch * config.width as f32 / 2.0,
            pitch * config.depth as f32 / 2.0,
        );
        let max_distance = center.distance(WorldPos::default());

        let mut cells = Vec::with_capacity((config.width * config.depth).max(0) as usize);
        let mut index = 0u32;
        for y in 0..config.depth {
            for x in 0..config.width {
                let position = WorldPos::new(x as f32 * pitch, y as f32 * pitch);
                let from_center = position.distance(center);
                let block_type = if from_center <= max_distance / 4.0 {
                    BlockType::InnerCity
                } else if from_center <= max_distance / 2.0 {
                    BlockType::City
                } else if from_center <= max_distance / 1.5 {
                    BlockType::OuterCity
                } else {
                    BlockType::Suburban
                };
                let name = format!("{} {index}", block_type.name_prefix());
                index += 1;
                cells.push(Some(Block::new(
                    BlockCoord::new(x, y),
                    name,
                    block_type,
                    position,
                    config.block_size,
                    config.max_faction_members_supported,
                )));
            }
        }

        Self {
            width: config.width,
            depth: config.depth,
            pitch,
            cells,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn in_bounds(&self, coord: BlockCoord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.depth
    }

    fn index(&self, coord: BlockCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| (coord.y * self.width + coord.x) as usize)
    }

    pub fn block(&self, coord: BlockCoord) -> Option<&Block> {
        self.index(coord)
            .and_then(|i| self.cells.get(i))
            .and_then(Option::as_ref)
    }

    pub fn block_mut(&mut self, coord: BlockCoord) -> Option<&mut Block> {
        let i = self.index(coord)?;
        self.cells.get_mut(i).and_then(Option::as_mut)
    }

    /// Like `block`, for boundary callers that want an error.
    pub fn require_block(&self, coord: BlockCoord) -> SimResult<&Block> {
        self.block(coord).ok_or(SimError::BlockOutOfBounds {
            x: coord.x,
            y: coord.y,
        })
    }

    /// Every block in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.cells.iter().flatten()
    }

    /// Coordinates of every block in row-major order.
    pub fn coords(&self) -> Vec<BlockCoord> {
        self.blocks().map(|b| b.coord).collect()
    }

    /// The block whose footprint contains `pos`, if any. Roads between
    /// blocks belong to nobody.
    pub fn block_at_position(&self, pos: WorldPos) -> Option<BlockCoord> {
        let coord = BlockCoord::new(
            (pos.x / self.pitch).round() as i32,
            (pos.z / self.pitch).round() as i32,
        );
        self.block(coord)
            .filter(|block| block.contains_point(pos))
            .map(|block| block.coord)
    }

    /// Occupied 4-neighbors.
    pub fn neighbors(&self, coord: BlockCoord) -> SmallVec<[BlockCoord; 4]> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(|(dx, dy)| BlockCoord::new(coord.x + dx, coord.y + dy))
            .filter(|&c| self.block(c).is_some())
            .collect()
    }

    /// Search outward from `origin` for the first block matching `predicate`.
    ///
    /// Rings `d = 1..max_distance` (exclusive). Within ring `d`, step
    /// `i = 0..=d` and test `(x − d + i, y − i)` then `(x + d − i, y + i)`.
    /// Out-of-bounds and vacant cells are skipped and the origin is never
    /// returned. The scan covers the lower-left and upper-right diagonal
    /// edges of each diamond only.
    pub fn ring_search<F>(
        &self,
        origin: BlockCoord,
        max_distance: i32,
        mut predicate: F,
    ) -> Option<BlockCoord>
    where
        F: FnMut(&Block) -> bool,
    {
        for d in 1..max_distance {
            for i in 0..=d {
                let candidates = [
                    BlockCoord::new(origin.x - d + i, origin.y - i),
                    BlockCoord::new(origin.x + d - i, origin.y + i),
                ];
                for coord in candidates {
                    if coord == origin {
                        continue;
                    }
                    if self.block(coord).is_some_and(&mut predicate) {
                        return Some(coord);
                    }
                }
            }
        }
        None
    }
}
