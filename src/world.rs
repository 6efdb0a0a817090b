//! The boundary between this engine and the external entity system.
//!
//! Position, selection radius, faction, and speed are owned elsewhere (an
//! ECS, a scene graph, whatever the embedder uses) — the movement engine
//! only ever reads them through this trait, and never stores an owning
//! reference to an entity. `Out of scope` per the system description: the
//! concrete entity representation, asset loading, rendering.

use crate::fixed_math::FixedVec2;
use crate::ids::AgentId;

/// Faction identifier, opaque to the movement engine — only used for
/// partitioning `SEEK_ENEMIES` queries (`NavDesiredEnemySeekVelocity`).
pub type FactionId = u8;

/// Read-only view of agent attributes the movement engine needs but does
/// not own.
pub trait World {
    /// Current planar position of the agent.
    fn pos(&self, id: AgentId) -> FixedVec2;

    /// Selection / collision radius of the agent.
    fn radius(&self, id: AgentId) -> crate::fixed_math::FixedNum;

    /// Top speed, in world units per second. `0` (or mass-static) means
    /// the agent never participates in flocks or steering.
    fn max_speed(&self, id: AgentId) -> crate::fixed_math::FixedNum;

    /// `true` if the agent has no mass (a fixed structure, a decoration)
    /// and is therefore always skipped by flock and steering operations.
    fn is_stationary(&self, id: AgentId) -> bool;

    /// `true` if this agent can hold a combat stance; used only to decide
    /// whether the ARRIVED transition's "set aggressive stance" side
    /// effect applies (delegated to `events::EventSink`, never mutated
    /// directly by this crate).
    fn is_combat_capable(&self, id: AgentId) -> bool;

    /// Faction of the agent, for `SEEK_ENEMIES` queries.
    fn faction(&self, id: AgentId) -> FactionId;

    /// Write the agent's new planar position (height is looked up from
    /// the nav service and applied by the embedder's own transform,
    /// mirroring the original's "planar motion, vertical follows
    /// terrain" split).
    fn set_pos(&mut self, id: AgentId, pos: FixedVec2);

    /// Write the agent's new facing.
    fn set_orientation(&mut self, id: AgentId, orientation: glam::Quat);
}
