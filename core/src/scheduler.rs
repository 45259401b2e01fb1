//! The timer adapter every engine schedules its delayed work on.
//!
//! Tickets fire in non-decreasing time order, ties in scheduling order.
//! A canceled ticket never fires and a fired ticket is retired.

use std::{
    cmp::Reverse,
    collections::{
        BinaryHeap,
        HashMap,
    },
    fmt,
    time::Duration,
};

use crate::time::Time;

/// Identifies one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A schedulable unit of work.
///
/// The key is the `(type, id)` pair idempotent tasks are deduplicated by.
pub trait Task {
    type Key: PartialEq + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// A discrete-event timer queue owned by one engine instance.
pub struct Scheduler<T> {
    next_ticket: u64,
    queue: BinaryHeap<Reverse<(Time, Ticket)>>,
    pending: HashMap<Ticket, (Time, T)>,
}

impl<T: Task> Scheduler<T> {
    pub fn new() -> Self {
        Scheduler {
            next_ticket: 0,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Schedules `task` to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Time, delay: Duration, task: T) -> Ticket {
        self.schedule_at(now + delay, task)
    }

    /// Schedules `task` to fire at the absolute time `at`.
    pub fn schedule_at(&mut self, at: Time, task: T) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        trace!("Scheduling {:?} as {} at {}", task.key(), ticket, at);
        self.queue.push(Reverse((at, ticket)));
        self.pending.insert(ticket, (at, task));
        ticket
    }

    /// Cancels an outstanding ticket, returning its task.
    ///
    /// Canceling a fired or already canceled ticket is a no-op.
    pub fn cancel(&mut self, ticket: Ticket) -> Option<T> {
        self.pending.remove(&ticket).map(|(_, task)| task)
    }

    /// The outstanding ticket with the given key, if any.
    pub fn find_outstanding(&self, key: &T::Key) -> Option<Ticket> {
        self.pending
            .iter()
            .filter(|(_, (_, task))| task.key() == *key)
            .map(|(ticket, _)| *ticket)
            .min()
    }

    /// Cancels every outstanding ticket with the given key.
    ///
    /// Returns the number of canceled tickets.
    pub fn cancel_key(&mut self, key: &T::Key) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, (_, task)| task.key() != *key);
        before - self.pending.len()
    }

    /// When the outstanding ticket fires.
    pub fn deadline(&self, ticket: Ticket) -> Option<Time> {
        self.pending.get(&ticket).map(|(at, _)| *at)
    }

    /// The earliest time an outstanding ticket fires.
    pub fn next_deadline(&mut self) -> Option<Time> {
        self.discard_canceled();
        self.queue.peek().map(|Reverse((at, _))| *at)
    }

    /// Retires and returns the earliest ticket due at `now`.
    pub fn pop_due(&mut self, now: Time) -> Option<(Ticket, T)> {
        self.discard_canceled();
        match self.queue.peek() {
            Some(Reverse((at, _))) if *at <= now => {}
            _ => return None,
        }
        let Reverse((_, ticket)) = self.queue.pop()?;
        self.pending.remove(&ticket).map(|(_, task)| (ticket, task))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn discard_canceled(&mut self) {
        while let Some(Reverse((_, ticket))) = self.queue.peek() {
            if self.pending.contains_key(ticket) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T: Task> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
