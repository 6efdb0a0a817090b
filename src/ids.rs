//! Opaque identifier newtypes used throughout the engine.
//!
//! Every cross-reference between agents, flocks, and tasks is one of these
//! — never an owning pointer — so the registries can be plain id-indexed
//! maps/vectors (see `engine` and `flock`).

use serde::{Deserialize, Serialize};

/// Identity of a simulated agent, owned by the external entity system this
/// engine is generic over (see `world::World`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

/// Opaque destination id produced by the nav service from a target point.
/// Two target points that fall within the same flow-field equivalence
/// class share a `DestId`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestId(pub u32);

/// Task identifier, the microkernel's analogue of `AgentId`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

/// Sentinel returned by `WhoIs` when no task is registered under a name.
pub const NULL_TID: Tid = Tid(0);
