//! Virtual-time callback queue.
//!
//! Entries fire in `(fire_at_ms, insertion sequence)` order, so two replicas
//! that schedule the same calls in the same order pop them identically. Time
//! only moves when the owner asks for due entries; there is no wall clock here.

use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    queue: BTreeMap<(u64, u64), T>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, fire_at_ms: u64, payload: T) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.insert((fire_at_ms, seq), payload);
    }

    pub fn schedule_after(&mut self, now_ms: u64, delay_ms: u64, payload: T) {
        self.schedule_at(now_ms.saturating_add(delay_ms), payload);
    }

    /// Removes and returns the earliest entry due at or before `until_ms`.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(u64, T)> {
        let (&(fire_at, _), _) = self.queue.first_key_value()?;
        if fire_at > until_ms {
            return None;
        }
        self.queue
            .pop_first()
            .map(|((fire_at, _), payload)| (fire_at, payload))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_then_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(100, "b");
        scheduler.schedule_at(50, "a");
        scheduler.schedule_at(100, "c");

        assert_eq!(scheduler.pop_due(1_000), Some((50, "a")));
        assert_eq!(scheduler.pop_due(1_000), Some((100, "b")));
        assert_eq!(scheduler.pop_due(1_000), Some((100, "c")));
        assert_eq!(scheduler.pop_due(1_000), None);
    }

    #[test]
    fn entries_in_the_future_stay_queued() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(1_000, 2_100, 7u32);
        assert_eq!(scheduler.pop_due(3_099), None);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop_due(3_100), Some((3_100, 7)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn schedule_after_saturates() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(u64::MAX - 1, 10, ());
        assert_eq!(scheduler.pop_due(u64::MAX - 1), None);
        assert_eq!(scheduler.pop_due(u64::MAX), Some((u64::MAX, ())));
    }
}
