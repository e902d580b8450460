use parking_lot::Mutex;
use tokio::time::Instant;

use common::Cluster;

use crate::hooks::PlayerUuid;

/// A scheduled classification attempt: an immutable cluster snapshot, the
/// time it becomes due, and the author the change resolved to. Later mutation
/// of the live cluster never touches the snapshot.
#[derive(Debug, Clone)]
pub struct QueueEntry<T> {
    pub cluster: Cluster<T>,
    pub due_at: Instant,
    pub author: PlayerUuid,
}

/// Time-ordered, deduplicating queue of pending classification attempts.
///
/// Kept sorted by due time; inserts land after equal keys so ties stay
/// stable. Listener inserts race with worker dequeues, hence the lock.
#[derive(Debug, Default)]
pub struct DebounceQueue<T> {
    entries: Mutex<Vec<QueueEntry<T>>>,
}

impl<T: Clone> DebounceQueue<T> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    /// Drop every pending entry whose snapshot is adjacent to or contains the
    /// changed cluster. Returns whether anything was removed.
    pub fn cancel_overlapping(&self, cluster: &Cluster<T>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| !e.cluster.is_adjacent_or_contains(cluster));
        entries.len() != before
    }

    /// Schedule a snapshot. The caller has already cancelled whatever this
    /// entry supersedes.
    pub fn schedule(&self, cluster: Cluster<T>, due_at: Instant, author: PlayerUuid) {
        let mut entries = self.entries.lock();
        let at = entries.partition_point(|e| e.due_at <= due_at);
        entries.insert(at, QueueEntry { cluster, due_at, author });
    }

    /// Remove and return the earliest entry that is due at `now`, if any.
    pub fn pop_due(&self, now: Instant) -> Option<QueueEntry<T>> {
        let mut entries = self.entries.lock();
        if entries.first().is_some_and(|e| e.due_at <= now) {
            Some(entries.remove(0))
        } else {
            None
        }
    }

    pub fn next_due_at(&self) -> Option<Instant> {
        self.entries.lock().first().map(|e| e.due_at)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::{Block, Cluster};

    fn cluster_at(x: i32, y: i32) -> Cluster<u32> {
        Cluster::new(Block::new(x, y, 1, 0))
    }

    #[tokio::test(start_paused = true)]
    async fn pops_in_due_order() {
        let queue = DebounceQueue::new();
        let now = Instant::now();
        queue.schedule(cluster_at(0, 0), now + Duration::from_secs(2), "a".into());
        queue.schedule(cluster_at(10, 0), now + Duration::from_secs(1), "b".into());

        let later = now + Duration::from_secs(3);
        assert_eq!(queue.pop_due(later).unwrap().author, "b");
        assert_eq!(queue.pop_due(later).unwrap().author, "a");
        assert!(queue.pop_due(later).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn future_entries_are_not_due() {
        let queue = DebounceQueue::new();
        let now = Instant::now();
        queue.schedule(cluster_at(0, 0), now + Duration::from_secs(5), "a".into());
        assert!(queue.pop_due(now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_due_times_keep_insertion_order() {
        let queue = DebounceQueue::new();
        let due = Instant::now() + Duration::from_secs(1);
        queue.schedule(cluster_at(0, 0), due, "first".into());
        queue.schedule(cluster_at(10, 0), due, "second".into());
        assert_eq!(queue.pop_due(due).unwrap().author, "first");
        assert_eq!(queue.pop_due(due).unwrap().author, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_removes_overlapping_snapshots_only() {
        let queue = DebounceQueue::new();
        let due = Instant::now() + Duration::from_secs(1);
        queue.schedule(cluster_at(0, 0), due, "near".into());
        queue.schedule(cluster_at(50, 50), due, "far".into());

        assert!(queue.cancel_overlapping(&cluster_at(1, 0)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(due).unwrap().author, "far");

        assert!(!queue.cancel_overlapping(&cluster_at(1, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn consumed_entries_are_gone() {
        // At most one attempt per snapshot: once popped, nothing remains to
        // dispatch a second time.
        let queue = DebounceQueue::new();
        let due = Instant::now();
        queue.schedule(cluster_at(0, 0), due, "a".into());
        assert!(queue.pop_due(due).is_some());
        assert!(queue.is_empty());
        assert!(queue.pop_due(due).is_none());
    }
}
