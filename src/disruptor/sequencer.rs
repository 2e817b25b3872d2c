//! Sequencer Implementation
//!
//! The sequencer hands out sequence numbers to producers and keeps them from
//! lapping the slowest gating consumer. Single and multi producer claiming are
//! two variants of one claim strategy so the ring buffer never dispatches
//! through a trait object on the hot path.

use crate::disruptor::{ClaimWait, DisruptorError, ProducerType, Result, Sequence};
use crossbeam_utils::Backoff;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Counter that produces the next sequence to claim
#[derive(Debug)]
enum ClaimStrategy {
    /// Used by one producer at a time, so no read-modify-write is needed.
    /// `claiming` is set while a claim is outstanding.
    SingleProducer { next: Sequence, claiming: AtomicBool },
    /// Shared by every producer, advanced with an atomic fetch-add
    MultiProducer { next: Sequence },
}

impl ClaimStrategy {
    fn new(producer_type: ProducerType) -> Self {
        match producer_type {
            ProducerType::Single => ClaimStrategy::SingleProducer {
                next: Sequence::new(0),
                claiming: AtomicBool::new(false),
            },
            ProducerType::Multi => ClaimStrategy::MultiProducer {
                next: Sequence::new(0),
            },
        }
    }

    #[inline]
    fn get_and_increment(&self) -> i64 {
        match self {
            ClaimStrategy::SingleProducer { next, .. } => {
                let sequence = next.get_relaxed();
                next.set_relaxed(sequence + 1);
                sequence
            }
            ClaimStrategy::MultiProducer { next } => next.get_and_increment(),
        }
    }

    fn set(&self, value: i64) {
        match self {
            ClaimStrategy::SingleProducer { next, .. } | ClaimStrategy::MultiProducer { next } => {
                next.set(value)
            }
        }
    }

    fn peek(&self) -> i64 {
        match self {
            ClaimStrategy::SingleProducer { next, .. } | ClaimStrategy::MultiProducer { next } => {
                next.get()
            }
        }
    }
}

/// Claim-side coordinator owned by a ring buffer
///
/// Besides handing out sequences it tracks the gating set: the consumer
/// sequences a producer must never get more than `capacity - reserve_threshold`
/// slots ahead of. The minimum of that set is cached so the set itself is
/// only scanned when the cache says the ring may be full.
#[derive(Debug)]
pub struct Sequencer {
    producer_type: ProducerType,
    claim_strategy: ClaimStrategy,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    cached_gating_sequence: AtomicI64,
    capacity: usize,
    reserve_threshold: usize,
    claim_wait: ClaimWait,
}

impl Sequencer {
    /// Create a sequencer for a ring of `capacity` slots
    ///
    /// # Errors
    /// `InvalidReserveThreshold` when the reserve does not leave at least one
    /// slot of headroom.
    pub fn new(
        producer_type: ProducerType,
        capacity: usize,
        reserve_threshold: usize,
        claim_wait: ClaimWait,
    ) -> Result<Self> {
        if reserve_threshold >= capacity {
            return Err(DisruptorError::InvalidReserveThreshold {
                reserve: reserve_threshold,
                capacity,
            });
        }

        Ok(Self {
            producer_type,
            claim_strategy: ClaimStrategy::new(producer_type),
            gating_sequences: RwLock::new(Vec::new()),
            cached_gating_sequence: AtomicI64::new(crate::disruptor::INITIAL_CURSOR_VALUE),
            capacity,
            reserve_threshold,
            claim_wait,
        })
    }

    /// Whether one or several producers claim from this sequencer
    pub fn producer_type(&self) -> ProducerType {
        self.producer_type
    }

    /// Number of slots in the ring this sequencer guards
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots held back from producers on top of the one always kept free
    pub fn reserve_threshold(&self) -> usize {
        self.reserve_threshold
    }

    /// How a producer idles while the ring is full
    pub fn claim_wait(&self) -> ClaimWait {
        self.claim_wait
    }

    /// Mark a claim as outstanding
    ///
    /// # Panics
    /// With a single producer, if the previous claim has not been published
    /// or dropped yet. Two live claims there could share a slot.
    pub(crate) fn begin_claim(&self) {
        if let ClaimStrategy::SingleProducer { claiming, .. } = &self.claim_strategy {
            let overlapping = claiming.swap(true, Ordering::Acquire);
            assert!(
                !overlapping,
                "single producer ring buffer claimed while another claim is outstanding"
            );
        }
    }

    /// Release the claim taken by [`begin_claim`](Self::begin_claim)
    pub(crate) fn end_claim(&self) {
        if let ClaimStrategy::SingleProducer { claiming, .. } = &self.claim_strategy {
            claiming.store(false, Ordering::Release);
        }
    }

    /// Hand out the next sequence without any gating
    #[inline]
    pub(crate) fn get_and_increment(&self) -> i64 {
        self.claim_strategy.get_and_increment()
    }

    /// Reset the claim counter so the next claim returns `value`
    pub(crate) fn set_sequence(&self, value: i64) {
        self.claim_strategy.set(value);
    }

    /// The sequence the next claim will return
    pub fn next_sequence(&self) -> i64 {
        self.claim_strategy.peek()
    }

    /// Spin until `cursor` has reached `target`
    ///
    /// Publishing in claim order only needs this with several producers; a
    /// single producer is always its own predecessor.
    pub(crate) fn wait_for_cursor(&self, target: i64, cursor: &Sequence) {
        if self.producer_type.is_single() {
            return;
        }

        let backoff = Backoff::new();
        while cursor.get() < target {
            backoff.snooze();
        }
    }

    /// Claim the next sequence, blocking while the ring is too full
    ///
    /// With an empty gating set the producer gates on `cursor`, so it never
    /// laps a claim that has not been published yet.
    pub(crate) fn next(&self, cursor: &Sequence) -> i64 {
        let sequence = self.get_and_increment();
        self.wait_for_capacity(sequence, Some(cursor));
        sequence
    }

    /// Block until `sequence` may be handed out without lapping a gating consumer
    ///
    /// `cursor` also bounds the gating minimum and stands in for the gating
    /// set when it is empty; without one an empty set never blocks.
    pub(crate) fn wait_for_capacity(&self, sequence: i64, cursor: Option<&Sequence>) {
        let window = (self.capacity - self.reserve_threshold) as i64;
        let wrap_point = sequence - window;

        if wrap_point < self.cached_gating_sequence.load(Ordering::Acquire) {
            return;
        }

        loop {
            let (minimum, limit) = {
                let gating = self.gating_sequences.read();
                match (gating.is_empty(), cursor) {
                    (false, None) => (Sequence::get_minimum_sequence(&gating, i64::MAX), window),
                    (false, Some(cursor)) => (
                        Sequence::get_minimum_sequence(&gating, cursor.get()),
                        window,
                    ),
                    // only the claim one lap back, on the same slot, must be published
                    (true, Some(cursor)) => (cursor.get(), self.capacity as i64 + 1),
                    (true, None) => return,
                }
            };
            self.cached_gating_sequence.store(minimum, Ordering::Release);

            if sequence - minimum < limit {
                return;
            }
            self.claim_wait.idle();
        }
    }

    /// Add consumer sequences the producers must not overtake
    ///
    /// # Errors
    /// `InvalidConsumerSet` when `sequences` is empty.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<()> {
        if sequences.is_empty() {
            return Err(DisruptorError::InvalidConsumerSet);
        }

        let mut gating = self.gating_sequences.write();
        gating.extend(sequences.iter().cloned());
        // the cache only moves down here; claims raise it from live values
        let minimum = Sequence::get_minimum_sequence(&gating, i64::MAX);
        self.cached_gating_sequence.fetch_min(minimum, Ordering::AcqRel);
        Ok(())
    }

    /// Stop gating on `sequence`
    ///
    /// # Returns
    /// True if the sequence was part of the gating set
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        let before = gating.len();
        gating.retain(|gating_sequence| !Arc::ptr_eq(gating_sequence, sequence));
        before != gating.len()
    }

    /// Minimum across the gating set, or `default` when nothing gates
    pub fn minimum_gating_sequence(&self, default: i64) -> i64 {
        let gating = self.gating_sequences.read();
        Sequence::get_minimum_sequence(&gating, default)
    }

    /// Number of consumer sequences currently gating producers
    pub fn gating_sequence_count(&self) -> usize {
        self.gating_sequences.read().len()
    }
}
