//! Flock registry: an explicit arena vector of flocks, each a set of
//! agent ids sharing a destination (§4.1, §9 design notes — deliberately
//! not an ECS relationship; cross-references are plain ids/indices).

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::fixed_math::FixedVec2;
use crate::ids::{AgentId, DestId};

/// A set of agents sharing a destination.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flock {
    pub members: FxHashSet<AgentId>,
    pub target_xz: FixedVec2,
    pub dest_id: DestId,
}

impl Flock {
    pub fn contains(&self, agent: AgentId) -> bool {
        self.members.contains(&agent)
    }
}

/// Arena of currently active flocks. A linear scan over this vector is
/// the canonical way to answer "which flock is agent X in" and "is there
/// already a flock for destination D" — flock counts are small in
/// practice (§4.1), so this beats maintaining an auxiliary index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FlockRegistry {
    flocks: Vec<Flock>,
}

impl FlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flock> {
        self.flocks.iter()
    }

    pub fn len(&self) -> usize {
        self.flocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flocks.is_empty()
    }

    pub fn flock_for_agent(&self, agent: AgentId) -> Option<&Flock> {
        self.flocks.iter().find(|f| f.contains(agent))
    }

    fn flock_index_for_agent(&self, agent: AgentId) -> Option<usize> {
        self.flocks.iter().position(|f| f.contains(agent))
    }

    pub fn flock_for_dest(&self, dest: DestId) -> Option<&Flock> {
        self.flocks.iter().find(|f| f.dest_id == dest)
    }

    fn flock_index_for_dest(&self, dest: DestId) -> Option<usize> {
        self.flocks.iter().position(|f| f.dest_id == dest)
    }

    /// Remove `agent` from every flock it belongs to; destroy any flock
    /// left with zero members. An agent belongs to at most one flock in
    /// practice, but this matches the original's "scan all, remove from
    /// any" shape rather than assuming the invariant holds during a
    /// partially-applied operation.
    pub fn remove_from_flocks(&mut self, agent: AgentId) {
        self.flocks.retain_mut(|f| {
            f.members.remove(&agent);
            !f.members.is_empty()
        });
        debug_assert!(self.flock_for_agent(agent).is_none());
    }

    /// Disband every flock all of whose members are currently ARRIVED.
    /// This is the live per-tick check (§3 invariants): not "zero
    /// members" (members are only ever removed via `remove_from_flocks`,
    /// which already prunes empty flocks) but "every member has finished
    /// moving", matching the original `disband_empty_flocks` semantics.
    pub fn disband_arrived<F>(&mut self, mut is_arrived: F)
    where
        F: FnMut(AgentId) -> bool,
    {
        self.flocks
            .retain(|f| !f.members.iter().all(|&a| is_arrived(a)));
    }

    /// Merge `members` into the flock for `dest`, or create a new flock
    /// targeting `target_xz` if none exists yet. Returns the resulting
    /// flock's index.
    pub fn make_or_merge(
        &mut self,
        members: impl IntoIterator<Item = AgentId>,
        target_xz: FixedVec2,
        dest_id: DestId,
    ) -> usize {
        if let Some(idx) = self.flock_index_for_dest(dest_id) {
            self.flocks[idx].members.extend(members);
            idx
        } else {
            self.flocks.push(Flock {
                members: members.into_iter().collect(),
                target_xz,
                dest_id,
            });
            self.flocks.len() - 1
        }
    }

    pub fn remove_agent_from_its_flock(&mut self, agent: AgentId) {
        if let Some(idx) = self.flock_index_for_agent(agent) {
            self.flocks[idx].members.remove(&agent);
            if self.flocks[idx].members.is_empty() {
                self.flocks.remove(idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(n: u32) -> DestId {
        DestId(n)
    }

    #[test]
    fn make_or_merge_creates_new_flock() {
        let mut reg = FlockRegistry::new();
        let idx = reg.make_or_merge([AgentId(1), AgentId(2)], FixedVec2::ZERO, dest(1));
        assert_eq!(reg.len(), 1);
        assert!(reg.iter().nth(idx).unwrap().contains(AgentId(1)));
    }

    #[test]
    fn make_or_merge_merges_on_matching_dest() {
        let mut reg = FlockRegistry::new();
        reg.make_or_merge([AgentId(1)], FixedVec2::ZERO, dest(1));
        reg.make_or_merge([AgentId(2)], FixedVec2::ZERO, dest(1));
        assert_eq!(reg.len(), 1);
        let f = reg.flock_for_dest(dest(1)).unwrap();
        assert!(f.contains(AgentId(1)) && f.contains(AgentId(2)));
    }

    #[test]
    fn distinct_dest_ids_stay_separate_flocks() {
        let mut reg = FlockRegistry::new();
        reg.make_or_merge([AgentId(1)], FixedVec2::ZERO, dest(1));
        reg.make_or_merge([AgentId(2)], FixedVec2::ZERO, dest(2));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn remove_from_flocks_destroys_emptied_flock() {
        let mut reg = FlockRegistry::new();
        reg.make_or_merge([AgentId(1)], FixedVec2::ZERO, dest(1));
        reg.remove_from_flocks(AgentId(1));
        assert!(reg.is_empty());
    }

    #[test]
    fn disband_arrived_only_when_all_members_arrived() {
        let mut reg = FlockRegistry::new();
        reg.make_or_merge([AgentId(1), AgentId(2)], FixedVec2::ZERO, dest(1));
        reg.disband_arrived(|a| a == AgentId(1)); // only agent 1 arrived
        assert_eq!(reg.len(), 1, "flock survives while any member is still moving");
        reg.disband_arrived(|_| true);
        assert!(reg.is_empty());
    }
}
