//! Identifier generation for notes and strokes.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing identifiers.
///
/// Values are derived from wall-clock milliseconds so they stay readable and
/// sort by creation time, but two calls never return the same value: when the
/// clock has not advanced (or went backwards) the previous value plus one is
/// used instead. Shared between the tool manager (stroke ids) and the note
/// store (note ids).
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier, greater than every value issued or observed so far.
    pub fn next_id(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }

    /// Next note identifier.
    pub fn next_note_id(&self) -> String {
        self.next_id().to_string()
    }

    /// Record an identifier issued elsewhere (e.g. a stroke loaded from disk)
    /// so later values stay above it.
    pub fn observe(&self, id: u64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdGenerator::new();
        let mut previous = ids.next_id();
        for _ in 0..10_000 {
            let next = ids.next_id();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_observe_moves_floor() {
        let ids = IdGenerator::new();
        let far_future = Utc::now().timestamp_millis() as u64 + 1_000_000;
        ids.observe(far_future);
        assert_eq!(ids.next_id(), far_future + 1);
    }

    #[test]
    fn test_no_collisions_across_threads() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
    }
}
