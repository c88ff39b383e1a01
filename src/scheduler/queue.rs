//! A small in-memory priority queue over pending task ids. Task Store
//! remains the source of truth for task state; this queue just orders the
//! `pending` set for dispatch and tracks how long each entry has waited so
//! aging promotion can kick in.
//!
//! Ordered with a plain `Vec` scanned for the best candidate rather than a
//! `BinaryHeap`, since queue depth here is bounded by in-flight task volume,
//! not by a high-throughput requirement, and a scan keeps aging promotion
//! (which needs to inspect every entry, not just the head) straightforward.

use std::time::{Duration, Instant};

use crate::tasks::{Priority, TaskId};

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub pool: crate::agents::PoolKind,
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub deferrals: u32,
}

#[derive(Debug, Default)]
pub struct DispatchQueue {
    entries: Vec<QueueEntry>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        DispatchQueue { entries: Vec::new() }
    }

    pub fn push(&mut self, task_id: TaskId, pool: crate::agents::PoolKind, priority: Priority) {
        self.entries.push(QueueEntry {
            task_id,
            pool,
            priority,
            enqueued_at: Instant::now(),
            deferrals: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Promotes any entry that has waited at least `interval` since it was
    /// last promoted, one rank per interval elapsed, per §4.7's aging rule.
    /// Resets `enqueued_at` on promotion so the next promotion needs a fresh
    /// full interval, rather than firing once per tick forever.
    pub fn promote_stale(&mut self, interval: Duration) {
        let now = Instant::now();
        for entry in &mut self.entries {
            if entry.priority != Priority::Critical && now.duration_since(entry.enqueued_at) >= interval {
                entry.priority = entry.priority.promoted();
                entry.enqueued_at = now;
            }
        }
    }

    /// Removes and returns the best candidate for `pool`: highest priority,
    /// then earliest enqueued (FIFO within a priority band).
    pub fn take_best_for_pool(&mut self, pool: crate::agents::PoolKind) -> Option<QueueEntry> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.pool == pool)
            .min_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(a.enqueued_at.cmp(&b.enqueued_at)))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(idx))
    }

    /// Puts a deferred entry back without resetting its wait clock, so it
    /// keeps aging toward promotion while its pool is saturated.
    pub fn requeue_deferred(&mut self, mut entry: QueueEntry) {
        entry.deferrals += 1;
        self.entries.push(entry);
    }

    pub fn remove_task(&mut self, task_id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.task_id != task_id);
        self.entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::PoolKind;

    #[test]
    fn higher_priority_dispatches_first() {
        let mut q = DispatchQueue::new();
        let low = TaskId::new();
        let high = TaskId::new();
        q.push(low, PoolKind::General, Priority::Low);
        q.push(high, PoolKind::General, Priority::High);
        let best = q.take_best_for_pool(PoolKind::General).unwrap();
        assert_eq!(best.task_id, high);
    }

    #[test]
    fn fifo_within_same_priority() {
        let mut q = DispatchQueue::new();
        let first = TaskId::new();
        std::thread::sleep(Duration::from_millis(2));
        let second = TaskId::new();
        q.push(second, PoolKind::General, Priority::Medium);
        q.push(first, PoolKind::General, Priority::Medium);
        // first was constructed earlier but pushed second; enqueue order,
        // not id construction order, determines FIFO position.
        let best = q.take_best_for_pool(PoolKind::General).unwrap();
        assert_eq!(best.task_id, second);
    }

    #[test]
    fn pool_filter_skips_other_pools() {
        let mut q = DispatchQueue::new();
        let coding = TaskId::new();
        q.push(coding, PoolKind::Coding, Priority::Critical);
        assert!(q.take_best_for_pool(PoolKind::General).is_none());
        assert!(q.take_best_for_pool(PoolKind::Coding).is_some());
    }

    #[test]
    fn aging_promotes_after_interval() {
        let mut q = DispatchQueue::new();
        let id = TaskId::new();
        q.push(id, PoolKind::General, Priority::Low);
        q.promote_stale(Duration::from_millis(0));
        let entry = q.take_best_for_pool(PoolKind::General).unwrap();
        assert_eq!(entry.priority, Priority::Medium);
    }

    #[test]
    fn critical_priority_has_no_ceiling_overflow() {
        let mut q = DispatchQueue::new();
        let id = TaskId::new();
        q.push(id, PoolKind::General, Priority::Critical);
        q.promote_stale(Duration::from_millis(0));
        let entry = q.take_best_for_pool(PoolKind::General).unwrap();
        assert_eq!(entry.priority, Priority::Critical);
    }
}
