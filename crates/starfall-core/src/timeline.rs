//! Deferred-action task list driven by an external monotonic clock.
//!
//! Tasks fire in (due time, issue order). Each task carries the generation
//! that was current when it was scheduled; `cancel_all` bumps the generation
//! so older tasks are dropped instead of fired.

use std::collections::BTreeMap;

/// Monotonic time in milliseconds, measured from an arbitrary origin.
pub type Millis = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheduled<A> {
    pub due: Millis,
    pub generation: u64,
    pub action: A,
}

#[derive(Clone, Debug)]
pub struct Timeline<A> {
    tasks: BTreeMap<(Millis, u64), Scheduled<A>>,
    next_seq: u64,
    generation: u64,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_seq: 0,
            generation: 0,
        }
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire at `due`.
    pub fn after(&mut self, now: Millis, delay: Millis, action: A) {
        let due = now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(
            (due, seq),
            Scheduled {
                due,
                generation: self.generation,
                action,
            },
        );
    }

    /// Invalidate every pending task.
    pub fn cancel_all(&mut self) {
        self.generation += 1;
    }

    /// Remove and return the earliest live task due at or before `now`.
    /// Stale tasks encountered on the way are discarded.
    pub fn pop_due(&mut self, now: Millis) -> Option<Scheduled<A>> {
        loop {
            let entry = self.tasks.first_entry()?;
            if entry.key().0 > now {
                return None;
            }
            let task = entry.remove();
            if task.generation == self.generation {
                return Some(task);
            }
            tracing::debug!(due = task.due, "dropping cancelled task");
        }
    }

    /// Due time of the earliest live task.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.tasks
            .values()
            .find(|t| t.generation == self.generation)
            .map(|t| t.due)
    }

    /// Number of live tasks.
    pub fn pending(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.generation == self.generation)
            .count()
    }
}
