//! Timers - Virtual-time event-loop timer queue
//!
//! The host owns the clock: it calls `advance` as real (or simulated) time
//! passes. Due timers run in (due time, scheduling order). A callback that
//! schedules a new timer falling inside the advanced window sees it run in
//! the same `advance` call, exactly as a browser event loop would.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type TimerCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct TimerQueue {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, u64), TimerCallback>,
}

/// Shared timer queue handle. Clones drive the same clock.
#[derive(Clone, Default)]
pub struct Timers {
    queue: Rc<RefCell<TimerQueue>>,
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("Timers")
            .field("now", &queue.now)
            .field("pending", &queue.pending.len())
            .finish()
    }
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Schedule `callback` to run `delay` from now.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        let due = queue.now + delay;
        queue.pending.insert((due, id), Box::new(callback));
        TimerId(id)
    }

    /// Cancel a pending timer. Returns false if it already ran or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut queue = self.queue.borrow_mut();
        let key = queue.pending.keys().find(|(_, seq)| *seq == id.0).copied();
        match key {
            Some(key) => queue.pending.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.queue.borrow().pending.keys().any(|(_, seq)| *seq == id.0)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    /// Move the clock forward by `by`, running every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;

        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due = queue.pending.first_key_value().map(|(&(due, _), _)| due);
                match due {
                    Some(due) if due <= target => {
                        queue.now = due;
                        queue.pending.pop_first().map(|(_, callback)| callback)
                    }
                    _ => None,
                }
            };

            match next {
                Some(callback) => callback(),
                None => break,
            }
        }

        self.queue.borrow_mut().now = target;
    }

    /// Run every pending timer, however far away.
    pub fn run_all(&self) {
        loop {
            let due = self.queue.borrow().pending.first_key_value().map(|(&(due, _), _)| due);
            match due {
                Some(due) => {
                    let now = self.now();
                    self.advance(due.saturating_sub(now));
                }
                None => break,
            }
        }
    }
}
