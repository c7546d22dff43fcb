//! Run-scoped monotonic counters.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Monotonically increasing identifier source for method executions.
///
/// One instance lives for the duration of a run, owned by the coordinator and
/// passed to whoever constructs method contexts. The atomic increment is the
/// single point guaranteeing that concurrent method starts never collide on a
/// run index.
#[derive(Debug)]
pub struct SequenceCounter {
    next: AtomicUsize,
}

impl SequenceCounter {
    /// Counter starting at 1, matching report numbering.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: usize) -> Self {
        Self {
            next: AtomicUsize::new(first),
        }
    }

    /// Claim the next index. Never returns the same value twice.
    pub fn next(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The index the next call to [`next`](Self::next) would return.
    pub fn peek(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_at_one_and_increments() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.peek(), 3);
    }

    #[test]
    fn concurrent_claims_are_unique_and_gapless() {
        let counter = Arc::new(SequenceCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                (0..100).map(|_| counter.next()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("join"))
            .collect();
        all.sort_unstable();
        let expected: Vec<usize> = (1..=800).collect();
        assert_eq!(all, expected);
    }
}
