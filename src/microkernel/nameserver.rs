//! The nameserver system task (§4.8): an idempotent string-name to `Tid`
//! registry, grounded on `original_source/src/task.c`'s `nameserver_task`.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::ids::{Tid, NULL_TID};

use super::kernel::TaskHandle;

/// Requests understood by the nameserver task.
#[derive(Debug, Clone)]
pub enum NsRequest {
    /// Bind the sender's tid to `name`. Idempotent: registering the same
    /// name again (by the same or a different tid) simply rebinds it.
    Register(String),
    /// Look up the tid bound to `name`, or `NULL_TID` if none.
    WhoIs(String),
}

/// Replies sent back by the nameserver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsReply {
    Registered,
    Tid(Tid),
}

/// Body of the nameserver task. Intended to be handed to
/// `TaskHandle::create`/`Kernel::create` and run forever: it owns its
/// name table for the lifetime of the task and never returns.
///
/// The reply always targets the sender captured fresh from the
/// `receive()` call in *this* loop iteration, never a value left over
/// from a previous one (SPEC_FULL.md §9 — confirmed correct against the
/// original, not a bug).
pub fn nameserver_task(handle: TaskHandle) {
    let names: Arc<Mutex<FxHashMap<String, Tid>>> = Arc::new(Mutex::new(FxHashMap::default()));

    let names_for_dtor = names.clone();
    handle.set_destructor(move || {
        let count = names_for_dtor.lock().unwrap().len();
        tracing::debug!(count, "nameserver destructor: releasing names");
    });

    loop {
        let (sender, msg) = handle.receive();
        let req = *msg
            .downcast::<NsRequest>()
            .expect("nameserver received a message of the wrong type");

        match req {
            NsRequest::Register(name) => {
                tracing::trace!(%name, tid = sender.0, "nameserver register");
                names.lock().unwrap().insert(name, sender);
                handle.reply(sender, NsReply::Registered);
            }
            NsRequest::WhoIs(name) => {
                let tid = names.lock().unwrap().get(&name).copied().unwrap_or(NULL_TID);
                tracing::trace!(%name, found = tid.0, "nameserver whois");
                handle.reply(sender, NsReply::Tid(tid));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microkernel::kernel::Kernel;

    #[test]
    fn register_then_whois_returns_the_registering_tid() {
        let (kernel, root) = Kernel::new();
        let (ns_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 10, nameserver_task);

        let reply = root.send(ns_tid, NsRequest::Register("a".to_string()));
        assert!(matches!(*reply.downcast::<NsReply>().unwrap(), NsReply::Registered));

        let reply = root.send(ns_tid, NsRequest::WhoIs("a".to_string()));
        match *reply.downcast::<NsReply>().unwrap() {
            NsReply::Tid(tid) => assert_eq!(tid, root.my_tid()),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn whois_of_unregistered_name_returns_null_tid() {
        let (kernel, root) = Kernel::new();
        let (ns_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 10, nameserver_task);

        let reply = root.send(ns_tid, NsRequest::WhoIs("nobody".to_string()));
        match *reply.downcast::<NsReply>().unwrap() {
            NsReply::Tid(tid) => assert_eq!(tid, NULL_TID),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn register_is_idempotent_and_rebinding_is_allowed() {
        let (kernel, root) = Kernel::new();
        let (ns_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 10, nameserver_task);

        // Same tid registers "a" twice: no error, still resolves to itself.
        root.send(ns_tid, NsRequest::Register("a".to_string()));
        root.send(ns_tid, NsRequest::Register("a".to_string()));
        let reply = root.send(ns_tid, NsRequest::WhoIs("a".to_string()));
        match *reply.downcast::<NsReply>().unwrap() {
            NsReply::Tid(tid) => assert_eq!(tid, root.my_tid()),
            other => panic!("unexpected reply: {:?}", other),
        }

        // A different tid then registers "a": it rebinds.
        let (other_tid, other_fut) = kernel.create::<(), _>(root.my_tid(), 0, move |h| {
            h.send(ns_tid, NsRequest::Register("a".to_string()));
        });
        other_fut.get();
        let reply = root.send(ns_tid, NsRequest::WhoIs("a".to_string()));
        match *reply.downcast::<NsReply>().unwrap() {
            NsReply::Tid(tid) => assert_eq!(tid, other_tid),
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
