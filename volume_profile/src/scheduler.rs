//! Single-threaded cooperative timer queue.
//!
//! Debounce and retry timers are tasks on a [`Scheduler`] whose clock only moves
//! when the owner calls [`Scheduler::advance`]. Tests drive it with exact
//! millisecond steps; a live front end advances it from its own event loop.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

pub type TimerId = u64;

type Task = Box<dyn FnOnce()>;

/// Pending tasks ordered by `(deadline, id)`, so equal deadlines fire in
/// scheduling order.
#[derive(Default)]
pub struct TimerQueue {
    now_ms: u64,
    next_id: TimerId,
    tasks: BTreeMap<(u64, TimerId), Task>,
    deadlines: HashMap<TimerId, u64>,
}

impl TimerQueue {
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, task: Task) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        let deadline = self.now_ms.saturating_add(delay_ms);
        self.tasks.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Returns `false` if the timer already fired or was never scheduled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.tasks.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Pops the earliest task due at or before `until`, moving the clock to its deadline.
    fn pop_due(&mut self, until: u64) -> Option<Task> {
        let (&(deadline, id), _) = self.tasks.first_key_value()?;
        if deadline > until {
            return None;
        }
        self.deadlines.remove(&id);
        self.now_ms = deadline;
        self.tasks.remove(&(deadline, id))
    }
}

/// Shared handle to a [`TimerQueue`]. Clones refer to the same queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<TimerQueue>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.queue.borrow().now_ms()
    }

    pub fn schedule(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> TimerId {
        self.queue.borrow_mut().schedule(delay_ms, Box::new(task))
    }

    pub fn cancel(&self, id: TimerId) -> bool {
        self.queue.borrow_mut().cancel(id)
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().pending()
    }

    /// Moves the clock forward by `by_ms`, running every task that comes due.
    ///
    /// Tasks run with the queue unborrowed, so they may schedule or cancel
    /// timers; anything they schedule inside the window also runs. Returns the
    /// number of tasks run.
    pub fn advance(&self, by_ms: u64) -> usize {
        let until = self.now_ms().saturating_add(by_ms);
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_due(until);
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        self.queue.borrow_mut().now_ms = until;
        ran
    }
}
