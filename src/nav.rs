//! The navigation service boundary.
//!
//! The nav grid and flow-field solver are out of scope for this crate
//! (§1): they are consumed as an opaque collaborator through this trait.
//! Every method is a pure function of the nav state plus the blocker
//! field — none of them can fail in a way the engine needs to handle;
//! "unreachable" targets are coerced to the closest reachable point by
//! the nav service itself, never by the caller.

use crate::fixed_math::{FixedNum, FixedVec2};
use crate::ids::{AgentId, DestId};
use crate::world::FactionId;

/// Opaque collaborator that answers pathability, flow-field, and
/// blocker-field questions. The movement engine is generic over this
/// trait and never assumes a concrete nav-grid representation.
pub trait NavService {
    /// Snap `target` to the closest point reachable from `from`.
    fn closest_reachable_dest(&self, from: FixedVec2, target: FixedVec2) -> FixedVec2;

    /// Opaque destination id for a target point; two points served by the
    /// same flow field share an id.
    fn dest_id_for_pos(&self, pos: FixedVec2) -> DestId;

    /// Line of sight from `pos` to the destination's target point.
    fn has_dest_los(&self, dest: DestId, pos: FixedVec2) -> bool;

    /// Is `pos` pathable (not blocked by terrain or a blocker)?
    fn position_pathable(&self, pos: FixedVec2) -> bool;

    /// Is `pos` already "maximally close" to `dest` — i.e. the flow field
    /// reports no further progress is achievable (used by the MOVING ->
    /// ARRIVED transition alongside the arrival-radius check)?
    fn is_maximally_close(&self, dest: DestId, pos: FixedVec2) -> bool;

    /// Desired velocity toward `dest`/`target` from `pos`, per the flow
    /// field. Used for the MOVING steering blend.
    fn desired_point_seek_velocity(
        &self,
        dest: DestId,
        pos: FixedVec2,
        target: FixedVec2,
    ) -> FixedVec2;

    /// Desired velocity toward the nearest enemy of `faction` from `pos`.
    /// Used for the SEEK_ENEMIES steering blend.
    fn desired_enemy_seek_velocity(&self, pos: FixedVec2, faction: FactionId) -> FixedVec2;

    /// Register a circular footprint as unpathable, attributable to
    /// `owner`. Every call must be matched by exactly one
    /// `blockers_decref` over the owner's lifetime (§5).
    fn blockers_incref(&mut self, owner: AgentId, pos: FixedVec2, radius: FixedNum);

    /// Release a footprint previously registered by `owner`.
    fn blockers_decref(&mut self, owner: AgentId, pos: FixedVec2, radius: FixedNum);

    /// World-space dimensions of one nav tile; used by the impassability
    /// gate to compute tile-aligned neighbor probe points.
    fn tile_dims(&self) -> (FixedNum, FixedNum);

    /// Terrain height at a planar point, for positioning after
    /// integration (vertical follows terrain; motion itself is planar).
    fn height_at_point(&self, pos: FixedVec2) -> FixedNum;
}

/// A minimal, fully-pathable nav service for unit and integration tests:
/// no obstacles, flat terrain, flow field always points straight at the
/// target, and destination ids are derived from a coarse quantization of
/// the target point (close points collapse to the same id, matching the
/// "equivalence class" semantics of a real flow field).
#[derive(Debug, Default)]
pub struct MockNavService {
    pub blocker_refcounts: rustc_hash::FxHashMap<(AgentId, [i64; 2]), u32>,
}

impl MockNavService {
    pub fn new() -> Self {
        Self::default()
    }

    fn quantize(pos: FixedVec2) -> [i64; 2] {
        const CELL: f32 = 4.0;
        let (x, y) = pos.to_f32();
        [(x / CELL).floor() as i64, (y / CELL).floor() as i64]
    }
}

impl NavService for MockNavService {
    fn closest_reachable_dest(&self, _from: FixedVec2, target: FixedVec2) -> FixedVec2 {
        target
    }

    fn dest_id_for_pos(&self, pos: FixedVec2) -> DestId {
        let [qx, qy] = Self::quantize(pos);
        let hash = (qx.wrapping_mul(73_856_093) ^ qy.wrapping_mul(19_349_663)) as u32;
        DestId(hash | 1)
    }

    fn has_dest_los(&self, dest: DestId, _pos: FixedVec2) -> bool {
        // `DestId(0)` is the sentinel the steering blend passes for
        // SEEK_ENEMIES queries (no real destination registered); treat it
        // as never-in-LOS so `arrive_force` takes its `vdes` branch, as
        // the steering module's doc comments promise.
        dest.0 != 0
    }

    fn position_pathable(&self, _pos: FixedVec2) -> bool {
        true
    }

    fn is_maximally_close(&self, _dest: DestId, _pos: FixedVec2) -> bool {
        false
    }

    fn desired_point_seek_velocity(
        &self,
        _dest: DestId,
        pos: FixedVec2,
        target: FixedVec2,
    ) -> FixedVec2 {
        (target - pos).normalize()
    }

    fn desired_enemy_seek_velocity(&self, _pos: FixedVec2, _faction: FactionId) -> FixedVec2 {
        FixedVec2::ZERO
    }

    fn blockers_incref(&mut self, owner: AgentId, pos: FixedVec2, _radius: FixedNum) {
        *self
            .blocker_refcounts
            .entry((owner, Self::quantize(pos)))
            .or_insert(0) += 1;
    }

    fn blockers_decref(&mut self, owner: AgentId, pos: FixedVec2, _radius: FixedNum) {
        let key = (owner, Self::quantize(pos));
        if let Some(count) = self.blocker_refcounts.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.blocker_refcounts.remove(&key);
            }
        }
    }

    fn tile_dims(&self) -> (FixedNum, FixedNum) {
        (FixedNum::from_num(1.0), FixedNum::from_num(1.0))
    }

    fn height_at_point(&self, _pos: FixedVec2) -> FixedNum {
        FixedNum::ZERO
    }
}
