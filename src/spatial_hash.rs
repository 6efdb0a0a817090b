//! Single-resolution spatial hash for neighbor queries (separation,
//! cohesion, ClearPath). The original engine stages multiple grids at
//! different cell sizes keyed by entity radius class; this crate's agent
//! population and radius spread doesn't warrant that complexity, so a
//! single uniform grid sized off `Config::spatial_hash_cell_size` is
//! used instead — the query radii in this crate (§6: 30, 50 units) are
//! all within a small constant factor of each other, which is exactly
//! the case the staggered design exists to handle and a uniform grid
//! doesn't.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::fixed_math::{FixedNum, FixedVec2};
use crate::ids::AgentId;

type CellCoord = (i64, i64);

#[derive(Debug, Default)]
pub struct SpatialHash {
    cell_size: FixedNum,
    cells: FxHashMap<CellCoord, SmallVec<[AgentId; 8]>>,
    positions: FxHashMap<AgentId, FixedVec2>,
}

impl SpatialHash {
    pub fn new(cell_size: FixedNum) -> Self {
        Self {
            cell_size,
            cells: FxHashMap::default(),
            positions: FxHashMap::default(),
        }
    }

    fn cell_of(&self, pos: FixedVec2) -> CellCoord {
        let (x, y) = pos.to_f32();
        let cs: f32 = self.cell_size.to_num();
        ((x / cs).floor() as i64, (y / cs).floor() as i64)
    }

    /// Rebuild from scratch for this tick, given an authoritative
    /// iterator of (agent, pos). Called once per tick, before steering,
    /// so every neighbor query this tick sees the same pre-tick snapshot
    /// (§4.7).
    pub fn rebuild(&mut self, agents: impl IntoIterator<Item = (AgentId, FixedVec2)>) {
        self.cells.clear();
        self.positions.clear();
        for (id, pos) in agents {
            let cell = self.cell_of(pos);
            self.cells.entry(cell).or_default().push(id);
            self.positions.insert(id, pos);
        }
    }

    /// All agents within `radius` of `pos`, excluding `self_id` if given.
    pub fn query_radius(
        &self,
        pos: FixedVec2,
        radius: FixedNum,
        self_id: Option<AgentId>,
    ) -> SmallVec<[AgentId; 16]> {
        let mut out = SmallVec::new();
        let (cx, cy) = self.cell_of(pos);
        let cs: f32 = self.cell_size.to_num();
        let r: f32 = radius.to_num();
        let span = (r / cs).ceil() as i64 + 1;
        let radius_sq = radius * radius;

        for dx in -span..=span {
            for dy in -span..=span {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &id in bucket {
                    if Some(id) == self_id {
                        continue;
                    }
                    let Some(&other_pos) = self.positions.get(&id) else {
                        continue;
                    };
                    if pos.distance_squared(other_pos) <= radius_sq {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    pub fn position_of(&self, id: AgentId) -> Option<FixedVec2> {
        self.positions.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fnum(v: f32) -> FixedNum {
        FixedNum::from_num(v)
    }

    #[test]
    fn finds_neighbor_within_radius() {
        let mut hash = SpatialHash::new(fnum(10.0));
        hash.rebuild([
            (AgentId(1), FixedVec2::ZERO),
            (AgentId(2), FixedVec2::new(fnum(3.0), fnum(0.0))),
            (AgentId(3), FixedVec2::new(fnum(100.0), fnum(0.0))),
        ]);
        let neighbors = hash.query_radius(FixedVec2::ZERO, fnum(5.0), Some(AgentId(1)));
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0], AgentId(2));
    }

    #[test]
    fn excludes_self() {
        let mut hash = SpatialHash::new(fnum(10.0));
        hash.rebuild([(AgentId(1), FixedVec2::ZERO)]);
        let neighbors = hash.query_radius(FixedVec2::ZERO, fnum(5.0), Some(AgentId(1)));
        assert!(neighbors.is_empty());
    }

    #[test]
    fn crosses_cell_boundaries() {
        let mut hash = SpatialHash::new(fnum(4.0));
        hash.rebuild([
            (AgentId(1), FixedVec2::new(fnum(3.9), fnum(0.0))),
            (AgentId(2), FixedVec2::new(fnum(4.1), fnum(0.0))),
        ]);
        let neighbors = hash.query_radius(FixedVec2::new(fnum(3.9), fnum(0.0)), fnum(1.0), None);
        assert_eq!(neighbors.len(), 2);
    }
}
