//! Navigation-blocker refcount coupling (§4.6): keeps the set of nav
//! blockers exactly consistent with the set of still agents. Every
//! increment has a matching future decrement (§3, §5 invariants).

use crate::fixed_math::{FixedNum, FixedVec2};
use crate::ids::AgentId;
use crate::motion::MotionState;
use crate::nav::NavService;

/// Register `agent` as a blocker at its current position/radius.
/// Asserts it wasn't already blocking — double-incref is an invariant
/// violation (§7), not a recoverable error.
pub fn entity_block(nav: &mut dyn NavService, agent: AgentId, ms: &mut MotionState, pos: FixedVec2, radius: FixedNum) {
    debug_assert!(!ms.blocking, "entity_block called while already blocking");
    nav.blockers_incref(agent, pos, radius);
    ms.blocking = true;
    ms.last_stop_pos = pos;
    ms.last_stop_radius = radius;
}

/// Release `agent`'s blocker footprint. Asserts it was blocking.
pub fn entity_unblock(nav: &mut dyn NavService, agent: AgentId, ms: &mut MotionState) {
    debug_assert!(ms.blocking, "entity_unblock called while not blocking");
    nav.blockers_decref(agent, ms.last_stop_pos, ms.last_stop_radius);
    ms.blocking = false;
}

/// Position or selection-radius changed while the agent is still:
/// rewrite the footprint atomically (decref old, incref new) so the
/// nav service never sees two live blockers for the same agent, even
/// transiently.
pub fn rewrite_footprint(nav: &mut dyn NavService, agent: AgentId, ms: &mut MotionState, new_pos: FixedVec2, new_radius: FixedNum) {
    if ms.blocking {
        nav.blockers_decref(agent, ms.last_stop_pos, ms.last_stop_radius);
        nav.blockers_incref(agent, new_pos, new_radius);
    }
    ms.last_stop_pos = new_pos;
    ms.last_stop_radius = new_radius;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::MockNavService;

    fn fnum(v: f32) -> FixedNum {
        FixedNum::from_num(v)
    }

    #[test]
    fn block_then_unblock_nets_to_zero_refcount() {
        let mut nav = MockNavService::new();
        let mut ms = MotionState::new_arrived(FixedVec2::ZERO, fnum(1.0));
        ms.blocking = false; // pretend it starts unblocked for this test
        entity_block(&mut nav, AgentId(1), &mut ms, FixedVec2::ZERO, fnum(1.0));
        assert!(ms.blocking);
        entity_unblock(&mut nav, AgentId(1), &mut ms);
        assert!(!ms.blocking);
        assert!(nav.blocker_refcounts.is_empty());
    }

    #[test]
    fn rewrite_footprint_moves_blocker_atomically() {
        let mut nav = MockNavService::new();
        let mut ms = MotionState::new_arrived(FixedVec2::ZERO, fnum(1.0));
        let new_pos = FixedVec2::new(fnum(20.0), fnum(0.0));
        rewrite_footprint(&mut nav, AgentId(1), &mut ms, new_pos, fnum(1.0));
        assert_eq!(ms.last_stop_pos, new_pos);
        assert_eq!(nav.blocker_refcounts.len(), 1);
    }
}
