//! Event-driven I/O, expressed as a small callback sink rather than a
//! process-wide event bus, so the engine stays single-threaded and the
//! embedder decides how (or whether) to propagate `MOTION_START` /
//! `MOTION_END` onward (animation triggers, network replication, etc).

use crate::ids::AgentId;

/// Emitted on an agent's still <-> active transition.
pub trait EventSink {
    /// Agent left ARRIVED/WAITING and began moving (or seeking enemies).
    fn on_motion_start(&mut self, agent: AgentId) {
        let _ = agent;
    }

    /// Agent entered ARRIVED or WAITING.
    fn on_motion_end(&mut self, agent: AgentId) {
        let _ = agent;
    }

    /// An agent that reached ARRIVED and can hold a combat stance should
    /// do so. Combat stance application itself is out of scope for this
    /// crate; this hook exists purely so the embedder can apply it.
    fn on_set_aggressive_stance(&mut self, agent: AgentId) {
        let _ = agent;
    }
}

/// Discards every event. The default sink for embedders that don't care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {}

/// Records every event in arrival order, for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingEventSink {
    pub starts: Vec<AgentId>,
    pub ends: Vec<AgentId>,
    pub aggressive: Vec<AgentId>,
}

impl EventSink for RecordingEventSink {
    fn on_motion_start(&mut self, agent: AgentId) {
        self.starts.push(agent);
    }

    fn on_motion_end(&mut self, agent: AgentId) {
        self.ends.push(agent);
    }

    fn on_set_aggressive_stance(&mut self, agent: AgentId) {
        self.aggressive.push(agent);
    }
}
