//! Cooperative task microkernel (§4.8): `Create`/`Send`/`Receive`/`Reply`/
//! `AwaitEvent`/`Wait` primitives plus the nameserver and timeserver system
//! tasks, grounded on `examples/original_source/src/task.c`.
//!
//! This module is independent of the movement engine; it models the
//! original's task-and-message-passing substrate, not the simulation
//! itself. See §9 for why it's built as OS threads serialized by a
//! turnstile mutex rather than a hand-rolled fiber scheduler.

mod kernel;
mod nameserver;
mod timeserver;

pub use kernel::{Kernel, Message, TaskFuture, TaskHandle, EventId, EVENT_60HZ_TICK, ROOT_TID};
pub use nameserver::{nameserver_task, NsReply, NsRequest};
pub use timeserver::{timeserver_task, TsRequest};

/// Spawn the nameserver and timeserver as children of `handle`, mirroring
/// `Task_CreateServices` in the original: called once, from the root task,
/// before any other task relies on name resolution or delayed wakeups.
pub fn create_services(handle: &TaskHandle) -> (crate::ids::Tid, crate::ids::Tid) {
    let (ns_tid, _ns_fut) = handle.create(10, nameserver_task);
    let (ts_tid, _ts_fut) = handle.create(10, timeserver_task);
    (ns_tid, ts_tid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_services_spawns_distinct_named_tasks() {
        let (_kernel, root) = Kernel::new();
        let (ns_tid, ts_tid) = create_services(&root);
        assert_ne!(ns_tid, ts_tid);
    }
}
