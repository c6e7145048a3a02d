//! Request identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of request identifiers.
///
/// Identifiers must be unique among concurrently live requests; the
/// dispatcher treats a collision as a broken generator.
pub trait UniqueIdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Decimal counter starting at `1`. Safe under concurrent use.
///
/// # Examples
///
/// ```
/// use scopeline::ids::{SequenceIdGenerator, UniqueIdGenerator};
///
/// let ids = SequenceIdGenerator::new();
/// assert_eq!(ids.next_id(), "1");
/// assert_eq!(ids.next_id(), "2");
/// ```
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    current: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues counting after `start`.
    pub fn starting_after(start: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
        }
    }
}

impl UniqueIdGenerator for SequenceIdGenerator {
    fn next_id(&self) -> String {
        (self.current.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

/// Random v4 UUIDs, for deployments where ids must not be guessable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl UniqueIdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sequence_is_unique_across_threads() {
        let ids = Arc::new(SequenceIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 4000);
        assert!(seen.contains("1") && seen.contains("4000"));
    }

    #[test]
    fn sequence_can_resume() {
        let ids = SequenceIdGenerator::starting_after(41);
        assert_eq!(ids.next_id(), "42");
    }

    #[test]
    fn uuids_differ() {
        let ids = UuidIdGenerator;
        let a = ids.next_id();
        assert_eq!(a.len(), 36);
        assert_ne!(a, ids.next_id());
    }
}
