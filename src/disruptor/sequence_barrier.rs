//! Sequence Barrier Implementation
//!
//! A sequence barrier tells a consumer how far it may read. It tracks the ring
//! buffer's cursor and, for consumers further down a pipeline, the sequences
//! of the consumers they depend on. It also carries the alert flag used to
//! cancel a consumer that is waiting for data.

use crate::disruptor::{DisruptorError, Result, Sequence, WaitStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coordination barrier between a consumer and what it depends on
pub trait SequenceBarrier: Send + Sync {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The highest available sequence, which may be beyond `sequence`
    ///
    /// # Errors
    /// `Alert` if the barrier is alerted before or while waiting
    fn wait_for(&self, sequence: i64) -> Result<i64>;

    /// Wait for the given sequence, giving up after `timeout`
    ///
    /// On timeout the best known available sequence is returned instead of an
    /// error; callers compare it with `sequence`.
    fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> Result<i64>;

    /// The highest sequence every tracked party has finished with
    fn processed_event_sequence(&self) -> i64;

    /// Current value of the ring buffer's cursor
    fn cursor(&self) -> i64;

    fn is_alerted(&self) -> bool;

    /// Raise the alert and wake every waiter
    fn alert(&self);

    fn clear_alert(&self);

    /// Fail with `Alert` if the barrier has been alerted
    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }
}

/// Barrier handed out by [`RingBuffer::create_barrier`](crate::disruptor::RingBuffer::create_barrier)
#[derive(Debug)]
pub struct ProcessingSequenceBarrier {
    cursor: Arc<Sequence>,
    wait_strategy: Arc<WaitStrategy>,
    dependent_sequences: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl ProcessingSequenceBarrier {
    /// Create a barrier over `cursor` and the upstream consumers in
    /// `dependent_sequences`
    ///
    /// # Arguments
    /// * `cursor` - The ring buffer's published cursor
    /// * `wait_strategy` - Shared with the ring so publishes wake this barrier
    /// * `dependent_sequences` - Consumers that must finish a slot first; may be empty
    pub fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependent_sequences,
            alerted: AtomicBool::new(false),
        }
    }

    /// The upstream consumers this barrier waits on
    pub fn dependent_sequences(&self) -> &[Arc<Sequence>] {
        &self.dependent_sequences
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.wait_strategy
            .wait_for(sequence, &self.cursor, &self.dependent_sequences, self)
    }

    fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> Result<i64> {
        self.wait_strategy.wait_for_timeout(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            self,
            timeout,
        )
    }

    fn processed_event_sequence(&self) -> i64 {
        Sequence::get_minimum_sequence(&self.dependent_sequences, self.cursor.get())
    }

    fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all();
    }

    fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }
}
