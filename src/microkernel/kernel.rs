//! The cooperative task scheduler (§4.8).
//!
//! Each task is its own OS thread, but a single turnstile ensures at most
//! one task's user code executes at a time: every blocking primitive
//! (`send`, `receive`, `await_event`, `wait`, `yield_now`) hands the baton
//! to the next ready task before the calling thread parks on the shared
//! condition variable. This reproduces the microkernel's cooperative,
//! single-threaded-at-a-time semantics without a hand-rolled fiber/stack
//! switcher (SPEC_FULL.md §9) — no part of this crate needs `unsafe`.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use crate::ids::{Tid, NULL_TID};

/// Type-erased message payload passed through `send`/`receive`/`reply`.
/// Servers downcast to the request/reply type they expect; a mismatched
/// downcast is scheduler misuse and panics, matching the "misuse is
/// fatal" semantics of §7.
pub type Message = Box<dyn Any + Send>;

/// Opaque event identifier consumed by `await_event`/`fire_event`.
pub type EventId = u32;

/// The 60 Hz tick event the timeserver's tick-notifier child awaits.
pub const EVENT_60HZ_TICK: EventId = 1;

/// The root task id, bound to the thread that constructs the `Kernel`.
pub const ROOT_TID: Tid = Tid(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Ready,
    Running,
    BlockedReceive,
    /// Blocked in `send`, waiting for `to` to `reply`.
    BlockedReply { to: Tid },
    BlockedEvent(EventId),
    BlockedWaitExit { target: Tid },
    Exited,
}

struct Envelope {
    sender: Tid,
    msg: Message,
}

struct TaskInfo {
    state: TaskState,
    priority: i32,
    parent: Tid,
    send_queue: VecDeque<Envelope>,
    /// Set by `reply()` for the sender to pick up once rescheduled.
    reply_slot: Option<Message>,
    /// Set by `fire_event()` for an event-waiter to pick up once rescheduled.
    event_payload: Option<u64>,
    destructor: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskInfo {
    fn new(priority: i32, parent: Tid, state: TaskState) -> Self {
        TaskInfo {
            state,
            priority,
            parent,
            send_queue: VecDeque::new(),
            reply_slot: None,
            event_payload: None,
            destructor: None,
        }
    }
}

struct State {
    next_tid: u32,
    tasks: HashMap<Tid, TaskInfo>,
    /// FIFO within a priority band; higher `priority` runs first (stable
    /// per band, matching "FIFO per receiver queue" fairness for §5).
    ready: VecDeque<Tid>,
    running: Option<Tid>,
    event_waiters: HashMap<EventId, VecDeque<Tid>>,
    exit_waiters: HashMap<Tid, Vec<Tid>>,
    exited: HashSet<Tid>,
}

impl State {
    fn make_ready(&mut self, tid: Tid) {
        let prio = self.tasks.get(&tid).map(|t| t.priority).unwrap_or(0);
        if let Some(info) = self.tasks.get_mut(&tid) {
            info.state = TaskState::Ready;
        }
        // insertion-sort by priority descending, stable among equals.
        let pos = self
            .ready
            .iter()
            .position(|&t| self.tasks.get(&t).map(|i| i.priority).unwrap_or(0) < prio)
            .unwrap_or(self.ready.len());
        self.ready.insert(pos, tid);
    }

    /// Pop the next ready task and hand it the baton. Leaves `running`
    /// as `None` ("scheduler idle") if nothing is ready.
    fn schedule_next(&mut self) {
        self.running = self.ready.pop_front();
        if let Some(tid) = self.running {
            if let Some(info) = self.tasks.get_mut(&tid) {
                info.state = TaskState::Running;
            }
        }
    }
}

/// The scheduler. Cheap to clone (an `Arc` handle); every `TaskHandle`
/// holds one.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    cv: Condvar,
}

impl Kernel {
    /// Construct a fresh scheduler, returning it alongside a `TaskHandle`
    /// bound to the calling thread (`ROOT_TID`), which already holds the
    /// baton since nothing else has been created yet.
    pub fn new() -> (Kernel, TaskHandle) {
        let mut tasks = HashMap::new();
        tasks.insert(ROOT_TID, TaskInfo::new(0, NULL_TID, TaskState::Running));
        let state = State {
            next_tid: ROOT_TID.0 + 1,
            tasks,
            ready: VecDeque::new(),
            running: Some(ROOT_TID),
            event_waiters: HashMap::new(),
            exit_waiters: HashMap::new(),
            exited: HashSet::new(),
        };
        let kernel = Kernel {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                cv: Condvar::new(),
            }),
        };
        let handle = TaskHandle {
            kernel: kernel.clone(),
            tid: ROOT_TID,
        };
        (kernel, handle)
    }

    /// Block the calling thread until it is the one holding the baton.
    fn park_until_running(&self, tid: Tid) {
        let guard = self.inner.state.lock().unwrap();
        let mut guard = self
            .inner
            .cv
            .wait_while(guard, |s| s.running != Some(tid))
            .unwrap();
        debug_assert_eq!(guard.running, Some(tid));
        drop(guard);
    }

    /// Spawn a new task. Does not block the caller (`Create` never
    /// blocks in §4.8) and does not relinquish the baton; the child
    /// merely joins the ready queue.
    pub fn create<T, F>(&self, parent: Tid, priority: i32, f: F) -> (Tid, TaskFuture<T>)
    where
        T: Send + 'static,
        F: FnOnce(TaskHandle) -> T + Send + 'static,
    {
        let tid = {
            let mut state = self.inner.state.lock().unwrap();
            let tid = Tid(state.next_tid);
            state.next_tid += 1;
            state
                .tasks
                .insert(tid, TaskInfo::new(priority, parent, TaskState::Ready));
            state.ready.push_back(tid);
            tid
        };

        let future = TaskFuture::new();
        let future_slot = future.clone();
        let kernel = self.clone();

        std::thread::Builder::new()
            .name(format!("task-{}", tid.0))
            .spawn(move || {
                kernel.park_until_running(tid);
                let handle = TaskHandle {
                    kernel: kernel.clone(),
                    tid,
                };
                let result = f(handle);
                future_slot.set(result);
                kernel.exit(tid);
            })
            .expect("failed to spawn task thread");

        (tid, future)
    }

    /// Run the current task's exit sequence: destructor, then wake
    /// `Wait(tid)` callers, then release the baton.
    fn exit(&self, tid: Tid) {
        let destructor = {
            let mut state = self.inner.state.lock().unwrap();
            state.tasks.get_mut(&tid).and_then(|t| t.destructor.take())
        };
        if let Some(dtor) = destructor {
            dtor();
        }

        let mut state = self.inner.state.lock().unwrap();
        state.exited.insert(tid);
        if let Some(info) = state.tasks.get_mut(&tid) {
            info.state = TaskState::Exited;
        }
        if let Some(waiters) = state.exit_waiters.remove(&tid) {
            for w in waiters {
                state.make_ready(w);
            }
        }
        debug_assert_eq!(state.running, Some(tid));
        state.schedule_next();
        self.inner.cv.notify_all();
    }

    /// Externally fire an event, waking every task currently blocked in
    /// `await_event(evt)`. Callable from outside the task system (the
    /// embedder's tick driver), not just from within a task.
    pub fn fire_event(&self, evt: EventId, payload: u64) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(waiters) = state.event_waiters.remove(&evt) {
            for w in waiters {
                if let Some(info) = state.tasks.get_mut(&w) {
                    info.event_payload = Some(payload);
                }
                state.make_ready(w);
            }
        }
        if state.running.is_none() {
            state.schedule_next();
        }
        self.inner.cv.notify_all();
    }
}

/// A one-shot slot a `create()` caller can block on to retrieve the
/// child's return value — the "future" out-parameter of §4.8's `Create`.
pub struct TaskFuture<T> {
    inner: Arc<(Mutex<Option<T>>, Condvar)>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        TaskFuture {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> TaskFuture<T> {
    fn new() -> Self {
        TaskFuture {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    fn set(&self, value: T) {
        let (lock, cv) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        *slot = Some(value);
        cv.notify_all();
    }

    /// Block the caller's own OS thread (not the scheduler baton — this
    /// is deliberately independent of the turnstile, since a caller may
    /// want to wait on a future from outside the task system entirely)
    /// until the child has produced its result.
    pub fn get(self) -> T {
        let (lock, cv) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        while slot.is_none() {
            slot = cv.wait(slot).unwrap();
        }
        slot.take().unwrap()
    }
}

/// A task's view of the scheduler: its own identity plus the primitives
/// from §4.8. Cheap to clone; every task thread owns exactly one.
#[derive(Clone)]
pub struct TaskHandle {
    kernel: Kernel,
    tid: Tid,
}

impl TaskHandle {
    pub fn my_tid(&self) -> Tid {
        self.tid
    }

    pub fn parent_tid(&self) -> Tid {
        let state = self.kernel.inner.state.lock().unwrap();
        state.tasks.get(&self.tid).map(|t| t.parent).unwrap_or(NULL_TID)
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Spawn a child task, inheriting this task as its parent.
    pub fn create<T, F>(&self, priority: i32, f: F) -> (Tid, TaskFuture<T>)
    where
        T: Send + 'static,
        F: FnOnce(TaskHandle) -> T + Send + 'static,
    {
        self.kernel.create(self.tid, priority, f)
    }

    /// Register a destructor that runs exactly once, on every exit path
    /// (normal return of the task closure), before `Wait` callers wake.
    pub fn set_destructor(&self, f: impl FnOnce() + Send + 'static) {
        let mut state = self.kernel.inner.state.lock().unwrap();
        if let Some(info) = state.tasks.get_mut(&self.tid) {
            info.destructor = Some(Box::new(f));
        }
    }

    /// Give up the baton and rejoin the back of the ready queue.
    pub fn yield_now(&self) {
        let mut state = self.kernel.inner.state.lock().unwrap();
        state.make_ready(self.tid);
        debug_assert_eq!(state.running, Some(self.tid));
        state.schedule_next();
        self.kernel.inner.cv.notify_all();
        drop(state);
        self.kernel.park_until_running(self.tid);
    }

    /// Send `msg` to `dst`, blocking until `dst` replies. Messages from
    /// this task to `dst` are delivered in send order (§5); `dst` need
    /// not have called `receive` yet.
    pub fn send<M: Send + 'static>(&self, dst: Tid, msg: M) -> Message {
        let mut state = self.kernel.inner.state.lock().unwrap();
        let envelope = Envelope {
            sender: self.tid,
            msg: Box::new(msg),
        };
        let dst_was_blocked_receive = matches!(
            state.tasks.get(&dst).map(|t| t.state),
            Some(TaskState::BlockedReceive)
        );
        state
            .tasks
            .get_mut(&dst)
            .unwrap_or_else(|| panic!("send to unknown tid {:?}", dst))
            .send_queue
            .push_back(envelope);
        if dst_was_blocked_receive {
            state.make_ready(dst);
        }

        state.tasks.get_mut(&self.tid).unwrap().state = TaskState::BlockedReply { to: dst };
        debug_assert_eq!(state.running, Some(self.tid));
        state.schedule_next();
        self.kernel.inner.cv.notify_all();
        drop(state);

        self.kernel.park_until_running(self.tid);

        let mut state = self.kernel.inner.state.lock().unwrap();
        state
            .tasks
            .get_mut(&self.tid)
            .unwrap()
            .reply_slot
            .take()
            .expect("woken from send without a reply queued")
    }

    /// Block until a sender is queued, returning `(sender, msg)`. If a
    /// message is already queued this returns immediately without
    /// yielding the baton.
    pub fn receive(&self) -> (Tid, Message) {
        let mut state = self.kernel.inner.state.lock().unwrap();
        if let Some(info) = state.tasks.get_mut(&self.tid) {
            if let Some(envelope) = info.send_queue.pop_front() {
                return (envelope.sender, envelope.msg);
            }
        }
        state.tasks.get_mut(&self.tid).unwrap().state = TaskState::BlockedReceive;
        debug_assert_eq!(state.running, Some(self.tid));
        state.schedule_next();
        self.kernel.inner.cv.notify_all();
        drop(state);

        self.kernel.park_until_running(self.tid);

        let mut state = self.kernel.inner.state.lock().unwrap();
        let envelope = state
            .tasks
            .get_mut(&self.tid)
            .unwrap()
            .send_queue
            .pop_front()
            .expect("woken from receive without a message queued");
        (envelope.sender, envelope.msg)
    }

    /// Unblock `src`, delivering `msg` as the reply to its pending
    /// `send`. Does not block the replier. Panics if `src` is not
    /// currently blocked on a send addressed to this task — that is
    /// scheduler misuse (§7).
    pub fn reply<M: Send + 'static>(&self, src: Tid, msg: M) {
        let mut state = self.kernel.inner.state.lock().unwrap();
        let matches_pending_send = matches!(
            state.tasks.get(&src).map(|t| t.state),
            Some(TaskState::BlockedReply { to }) if to == self.tid
        );
        assert!(
            matches_pending_send,
            "reply({:?}) but {:?} has no pending send to this task",
            src, src
        );
        state.tasks.get_mut(&src).unwrap().reply_slot = Some(Box::new(msg));
        state.make_ready(src);
        self.kernel.inner.cv.notify_all();
    }

    /// Block until `evt` fires, returning the payload the event source
    /// delivered.
    pub fn await_event(&self, evt: EventId) -> u64 {
        let mut state = self.kernel.inner.state.lock().unwrap();
        state.tasks.get_mut(&self.tid).unwrap().state = TaskState::BlockedEvent(evt);
        state.event_waiters.entry(evt).or_default().push_back(self.tid);
        debug_assert_eq!(state.running, Some(self.tid));
        state.schedule_next();
        self.kernel.inner.cv.notify_all();
        drop(state);

        self.kernel.park_until_running(self.tid);

        let mut state = self.kernel.inner.state.lock().unwrap();
        state
            .tasks
            .get_mut(&self.tid)
            .unwrap()
            .event_payload
            .take()
            .expect("woken from await_event without a payload")
    }

    /// Block until `target` has exited. Returns immediately if it
    /// already has.
    pub fn wait(&self, target: Tid) {
        let mut state = self.kernel.inner.state.lock().unwrap();
        if state.exited.contains(&target) {
            return;
        }
        state.tasks.get_mut(&self.tid).unwrap().state = TaskState::BlockedWaitExit { target };
        state.exit_waiters.entry(target).or_default().push(self.tid);
        debug_assert_eq!(state.running, Some(self.tid));
        state.schedule_next();
        self.kernel.inner.cv.notify_all();
        drop(state);

        self.kernel.park_until_running(self.tid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_receive_reply_rendezvous_round_trips() {
        let (kernel, root) = Kernel::new();
        let (_tid, fut) = kernel.create::<u32, _>(root.my_tid(), 0, |h| {
            let (src, msg) = h.receive();
            let n = *msg.downcast::<u32>().unwrap();
            h.reply(src, n + 1);
            0
        });
        let reply = root.send(_tid, 41u32);
        assert_eq!(*reply.downcast::<u32>().unwrap(), 42);
        fut.get();
    }

    #[test]
    fn receive_before_send_does_not_deadlock() {
        let (kernel, root) = Kernel::new();
        let (echo_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 0, |h| loop {
            let (src, msg) = h.receive();
            let s = *msg.downcast::<&'static str>().unwrap();
            h.reply(src, s);
        });
        let reply = root.send(echo_tid, "ping");
        assert_eq!(*reply.downcast::<&'static str>().unwrap(), "ping");
    }

    #[test]
    fn await_event_wakes_on_fire_event() {
        let (kernel, root) = Kernel::new();
        let (_tid, fut) = kernel.create::<u64, _>(root.my_tid(), 0, |h| h.await_event(EVENT_60HZ_TICK));
        // give the child a moment to park in await_event.
        std::thread::sleep(std::time::Duration::from_millis(10));
        kernel.fire_event(EVENT_60HZ_TICK, 7);
        assert_eq!(fut.get(), 7);
        let _ = root;
    }

    #[test]
    fn wait_returns_immediately_for_already_exited_task() {
        let (kernel, root) = Kernel::new();
        let (tid, fut) = kernel.create::<(), _>(root.my_tid(), 0, |_h| {});
        fut.get();
        std::thread::sleep(std::time::Duration::from_millis(10));
        root.wait(tid);
    }

    #[test]
    fn destructor_runs_exactly_once_on_exit() {
        let (kernel, root) = kernel_with_counter();
        let _ = (kernel, root);
    }

    fn kernel_with_counter() -> (Kernel, TaskHandle) {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let (kernel, root) = Kernel::new();
        let c = counter.clone();
        let (tid, fut) = kernel.create::<(), _>(root.my_tid(), 0, move |h| {
            h.set_destructor(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });
        fut.get();
        std::thread::sleep(std::time::Duration::from_millis(10));
        root.wait(tid);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        (kernel, root)
    }
}
