//! Per-agent motion state: the state machine driving MOVING / ARRIVED /
//! SEEK_ENEMIES / WAITING transitions, and the fields the steering and
//! integration pipelines read and write each tick.

use serde::{Deserialize, Serialize};

use crate::fixed_math::{FixedNum, FixedVec2};

/// Ring-buffer length for velocity history (`VEL_HIST_LEN` in the
/// tunables table). Fixed at 14, matching the authoritative constant.
pub const VEL_HIST_LEN: usize = 14;

/// The four motion states an agent can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    Moving,
    Arrived,
    SeekEnemies,
    Waiting,
}

impl MotionKind {
    /// "Still" = ARRIVED or WAITING (§4.2).
    pub fn is_still(self) -> bool {
        matches!(self, MotionKind::Arrived | MotionKind::Waiting)
    }
}

/// Per-agent motion state, owned entirely by the movement engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionState {
    pub state: MotionKind,

    /// Desired velocity returned by the nav service this tick.
    pub vdes: FixedVec2,
    /// Post-ClearPath velocity for this tick.
    pub vnew: FixedVec2,
    /// Current integrated velocity.
    pub velocity: FixedVec2,

    /// Is this agent currently registered as a nav blocker?
    pub blocking: bool,
    /// Exact blocker footprint, so it can be released precisely even if
    /// the agent later moves or grows. Not serialized (§6); reconciled on
    /// load from the agent's current position/radius.
    #[serde(skip)]
    pub last_stop_pos: FixedVec2,
    #[serde(skip)]
    pub last_stop_radius: FixedNum,

    /// State to resume to when WAITING ends.
    pub wait_prev: MotionKind,
    /// Ticks remaining before a WAITING agent resumes `wait_prev`.
    pub wait_ticks_left: u32,

    /// Ring buffer of past `vnew` values, for orientation smoothing.
    pub vel_hist: [FixedVec2; VEL_HIST_LEN],
    pub vel_hist_idx: usize,
}

impl MotionState {
    /// Initial state for a newly added agent: ARRIVED, with a blocker
    /// immediately claimed at its current position (§3 Lifecycle).
    pub fn new_arrived(pos: FixedVec2, radius: FixedNum) -> Self {
        Self {
            state: MotionKind::Arrived,
            vdes: FixedVec2::ZERO,
            vnew: FixedVec2::ZERO,
            velocity: FixedVec2::ZERO,
            blocking: true,
            last_stop_pos: pos,
            last_stop_radius: radius,
            wait_prev: MotionKind::Arrived,
            wait_ticks_left: 0,
            vel_hist: [FixedVec2::ZERO; VEL_HIST_LEN],
            vel_hist_idx: 0,
        }
    }

    pub fn is_still(&self) -> bool {
        self.state.is_still()
    }

    /// Push a new velocity sample into the ring buffer, advancing the
    /// cursor. Overwrites the oldest sample.
    pub fn push_vel_hist(&mut self, v: FixedVec2) {
        self.vel_hist[self.vel_hist_idx] = v;
        self.vel_hist_idx = (self.vel_hist_idx + 1) % VEL_HIST_LEN;
    }
}
