//! The timeserver system task (§4.8): delay/sleep scheduling driven by an
//! externally-fired 60 Hz tick event, grounded on
//! `original_source/src/task.c`'s `timeserver_task`/`tick_notifier`.
//!
//! Unlike the original's SDL-driven wall clock, this crate's clock source
//! is a monotonic tick counter the embedding caller advances by calling
//! `Kernel::fire_event(EVENT_60HZ_TICK, tick)` (§8 scenario 4).

use std::collections::BinaryHeap;

use crate::ids::Tid;

use super::kernel::{TaskHandle, EVENT_60HZ_TICK};

/// Requests understood by the timeserver task.
#[derive(Debug, Clone, Copy)]
pub enum TsRequest {
    /// Sent by the tick-notifier child on every `60HZ_TICK`.
    Notify(u64),
    /// Block the sender until `ticks` have elapsed on the driving clock.
    Delay(u64),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct DelayDesc {
    wake_tick: u64,
    tid: Tid,
}

// `BinaryHeap` is a max-heap; invert the ordering on `wake_tick` so the
// earliest wake time sorts to the top.
impl Ord for DelayDesc {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.wake_tick.cmp(&self.wake_tick)
    }
}
impl PartialOrd for DelayDesc {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Child task that awaits the 60 Hz tick event forever and forwards it
/// to its parent (the timeserver) as a `Notify`.
fn tick_notifier(handle: TaskHandle) {
    let parent = handle.parent_tid();
    loop {
        let tick = handle.await_event(EVENT_60HZ_TICK);
        handle.send(parent, TsRequest::Notify(tick));
    }
}

/// Body of the timeserver task. Spawns `tick_notifier` as a child, then
/// loops forever: on `Notify` it records the current tick and replies
/// immediately; on `Delay(ticks)` it pushes a wake descriptor without
/// replying yet. After handling either message, it pops and replies to
/// every descriptor whose wake tick has arrived, reinserting the rest.
pub fn timeserver_task(handle: TaskHandle) {
    let mut curr_tick: u64 = 0;
    let mut pending: BinaryHeap<DelayDesc> = BinaryHeap::new();

    let (_notifier_tid, _notifier_fut) = handle.create(0, tick_notifier);

    loop {
        let (sender, msg) = handle.receive();
        let req = *msg
            .downcast::<TsRequest>()
            .expect("timeserver received a message of the wrong type");

        match req {
            TsRequest::Notify(tick) => {
                curr_tick = tick;
                handle.reply(sender, ());
            }
            TsRequest::Delay(ticks) => {
                pending.push(DelayDesc {
                    wake_tick: curr_tick + ticks,
                    tid: sender,
                });
            }
        }

        // Anything left in the heap already satisfies wake_tick > curr_tick,
        // so no explicit reinsertion step is needed beyond leaving it alone.
        while let Some(desc) = pending.peek().copied() {
            if desc.wake_tick > curr_tick {
                break;
            }
            pending.pop();
            handle.reply(desc.tid, ());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microkernel::kernel::Kernel;

    #[test]
    fn sleep_is_replied_exactly_when_the_clock_reaches_the_target() {
        let (kernel, root) = Kernel::new();
        let (ts_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 10, timeserver_task);

        kernel.fire_event(EVENT_60HZ_TICK, 1);
        std::thread::sleep(std::time::Duration::from_millis(10));

        let (_sleeper_tid, sleeper_fut) = kernel.create::<u64, _>(root.my_tid(), 0, move |h| {
            h.send(ts_tid, TsRequest::Delay(3));
            3
        });
        std::thread::sleep(std::time::Duration::from_millis(10));

        for t in 2..=4u64 {
            kernel.fire_event(EVENT_60HZ_TICK, t);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert_eq!(sleeper_fut.get(), 3);
    }

    #[test]
    fn notify_replies_immediately_even_with_a_pending_delay() {
        let (kernel, root) = Kernel::new();
        let (ts_tid, _fut) = kernel.create::<(), _>(root.my_tid(), 10, timeserver_task);
        kernel.fire_event(EVENT_60HZ_TICK, 1);
        std::thread::sleep(std::time::Duration::from_millis(10));

        // A task blocked on a far-future delay must not hold up Notify's
        // immediate reply to an unrelated sender.
        let blocking_ts_tid = ts_tid;
        kernel.create::<(), _>(root.my_tid(), 0, move |h| {
            h.send(blocking_ts_tid, TsRequest::Delay(1_000_000));
        });
        std::thread::sleep(std::time::Duration::from_millis(10));

        let reply = root.send(ts_tid, TsRequest::Notify(2));
        assert!(reply.downcast::<()>().is_ok());
    }
}
