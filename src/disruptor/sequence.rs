//! Sequence implementation for the Disruptor
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between producers and consumers. The counter sits on its own cache line so
//! the hot cursor never shares a line with neighbouring fields.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A cache-line padded sequence counter
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Create a new sequence starting at [`INITIAL_CURSOR_VALUE`](crate::disruptor::INITIAL_CURSOR_VALUE)
    pub fn new_with_initial_value() -> Self {
        Self::new(crate::disruptor::INITIAL_CURSOR_VALUE)
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Read without synchronisation, for counters owned by a single thread
    #[inline]
    pub(crate) fn get_relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Write without synchronisation, for counters owned by a single thread
    #[inline]
    pub(crate) fn set_relaxed(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Atomically replace `expected` with `new`
    ///
    /// # Returns
    /// True if the value was updated
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Increment and get the new value
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Add a value and get the new result
    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel) + increment
    }

    /// Get the current value and then increment
    #[inline]
    pub fn get_and_increment(&self) -> i64 {
        self.value.fetch_add(1, Ordering::AcqRel)
    }

    /// Get the minimum value across `sequences`, never above `minimum`
    ///
    /// Pass `i64::MAX` to get the plain minimum; an empty slice then yields
    /// `i64::MAX`.
    pub fn get_minimum_sequence(sequences: &[Arc<Sequence>], minimum: i64) -> i64 {
        sequences
            .iter()
            .map(|sequence| sequence.get())
            .fold(minimum, i64::min)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new_with_initial_value()
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sequence_default() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), crate::disruptor::INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_sequence_occupies_cache_line() {
        assert!(std::mem::align_of::<Sequence>() >= 64);
    }

    #[test]
    fn test_sequence_increment() {
        let seq = Sequence::new(0);
        assert_eq!(seq.increment_and_get(), 1);
        assert_eq!(seq.get_and_increment(), 1);
        assert_eq!(seq.get(), 2);
        assert_eq!(seq.add_and_get(5), 7);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);
        assert!(seq.compare_and_set(10, 20));
        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_minimum_sequence() {
        let sequences = vec![
            Arc::new(Sequence::new(10)),
            Arc::new(Sequence::new(3)),
            Arc::new(Sequence::new(86)),
        ];
        assert_eq!(Sequence::get_minimum_sequence(&sequences, i64::MAX), 3);
        assert_eq!(Sequence::get_minimum_sequence(&sequences, 1), 1);
        assert_eq!(Sequence::get_minimum_sequence(&[], i64::MAX), i64::MAX);
        assert_eq!(Sequence::get_minimum_sequence(&[], 42), 42);
    }

    #[test]
    fn test_sequence_thread_safety() {
        let seq = Arc::new(Sequence::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        seq.increment_and_get();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seq.get(), 10_000);
    }
}
