//! Ring Buffer Implementation
//!
//! The ring buffer is a pre-allocated circular array of slots plus the cursor
//! marking the highest published sequence. Producers claim a slot, fill it in
//! place and publish it; consumers read published slots through a barrier.

use crate::disruptor::{
    ceiling_next_power_of_two, ClaimWait, DisruptorError, EventFactory, ProcessingSequenceBarrier,
    ProducerType, Result, RingBufferConfig, Sequence, Sequencer, Slot, WaitStrategy,
};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::debug;

/// How a claimed slot becomes visible to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishPolicy {
    /// Publish strictly after the previous sequence
    Append,
    /// The slot was claimed at a chosen sequence; publishing moves the claim
    /// counter past it
    Explicit,
}

/// The core ring buffer for exchanging events between threads
///
/// # Type Parameters
/// * `T` - The event type stored in each slot
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<Slot<T>>]>,
    /// capacity - 1, for turning a sequence into an index
    index_mask: i64,
    cursor: Arc<Sequence>,
    sequencer: Sequencer,
    wait_strategy: Arc<WaitStrategy>,
}

// SAFETY: a slot is only written by the producer holding its claim and only
// read by consumers once the cursor has published it. Gating consumers keep
// a producer from wrapping onto a slot that is still being read.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T>
where
    T: Send + Sync,
{
    /// Create a ring buffer holding at least `requested_capacity` slots
    ///
    /// The capacity is rounded up to the next power of two and every slot is
    /// filled by calling `factory` once.
    ///
    /// # Errors
    /// `InvalidCapacity` if `requested_capacity` is zero or too large to round up
    pub fn new<F>(
        factory: F,
        requested_capacity: usize,
        producer_type: ProducerType,
        wait_strategy: WaitStrategy,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        Self::build(
            factory,
            requested_capacity,
            producer_type,
            wait_strategy,
            0,
            ClaimWait::default(),
        )
    }

    /// Create a ring buffer from a [`RingBufferConfig`]
    pub fn with_config<F>(factory: F, config: &RingBufferConfig) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        config.validate()?;
        Self::build(
            factory,
            config.capacity,
            config.producer_type,
            config.wait_strategy.build(),
            config.reserve_threshold,
            config.claim_wait,
        )
    }

    fn build<F>(
        factory: F,
        requested_capacity: usize,
        producer_type: ProducerType,
        wait_strategy: WaitStrategy,
        reserve_threshold: usize,
        claim_wait: ClaimWait,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let capacity = ceiling_next_power_of_two(requested_capacity)
            .filter(|capacity| i64::try_from(*capacity).is_ok())
            .ok_or(DisruptorError::InvalidCapacity(requested_capacity))?;
        let sequencer = Sequencer::new(producer_type, capacity, reserve_threshold, claim_wait)?;

        let slots: Box<[UnsafeCell<Slot<T>>]> = (0..capacity)
            .map(|_| UnsafeCell::new(Slot::new(factory.new_instance())))
            .collect();

        debug!(
            capacity,
            requested_capacity,
            %producer_type,
            reserve_threshold,
            "ring buffer created"
        );

        Ok(Self {
            slots,
            index_mask: (capacity - 1) as i64,
            cursor: Arc::new(Sequence::new_with_initial_value()),
            sequencer,
            wait_strategy: Arc::new(wait_strategy),
        })
    }

    /// Claim the next slot in sequence order
    ///
    /// Blocks while claiming would lap a gating consumer. The returned slot
    /// must be published, or consumers (and with several producers, every
    /// later producer) will wait for it forever.
    ///
    /// # Panics
    /// On a [`ProducerType::Single`] ring, if an earlier claim is still
    /// outstanding.
    pub fn claim_next(&self) -> ClaimedSlot<'_, T> {
        self.sequencer.begin_claim();
        let sequence = self.sequencer.next(&self.cursor);
        // SAFETY: `next` hands out every sequence once and never one that laps
        // an unpublished claim. The claim guard keeps a single producer from
        // holding two claims at a time.
        unsafe { self.claimed(sequence, PublishPolicy::Append) }
    }

    /// Claim the slot for a specific sequence
    ///
    /// Meant for a single producer replaying or repositioning its stream.
    /// Gating still applies; publishing resets the claim counter to
    /// `sequence + 1`.
    ///
    /// # Safety
    /// No other claim may be outstanding for a sequence that maps to the same
    /// slot (`sequence` modulo capacity) while the returned slot is alive,
    /// whether it was made through this method or [`claim_next`](Self::claim_next)
    /// on another thread. On a [`ProducerType::Single`] ring overlapping
    /// claims panic instead; on a [`ProducerType::Multi`] ring the caller must
    /// keep every other producer away from the slot.
    ///
    /// # Panics
    /// On a [`ProducerType::Single`] ring, if an earlier claim is still
    /// outstanding.
    pub unsafe fn claim_specific(&self, sequence: i64) -> ClaimedSlot<'_, T> {
        self.sequencer.begin_claim();
        self.sequencer.wait_for_capacity(sequence, None);
        // SAFETY: exclusivity of the slot is the caller's contract.
        unsafe { self.claimed(sequence, PublishPolicy::Explicit) }
    }

    /// # Safety
    /// The caller must be the only holder of a claim on this slot.
    unsafe fn claimed(&self, sequence: i64, policy: PublishPolicy) -> ClaimedSlot<'_, T> {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: index is masked into bounds and UnsafeCell::get never
        // returns null. Exclusive access comes from the caller.
        let slot = unsafe {
            let slot = self.slots.get_unchecked(index).get();
            (*slot).set_sequence(sequence);
            NonNull::new_unchecked(slot)
        };

        ClaimedSlot {
            ring_buffer: self,
            slot,
            sequence,
            policy,
            _slot: PhantomData,
        }
    }

    /// Make a claimed slot visible to consumers
    pub fn publish(&self, claimed: ClaimedSlot<'_, T>) {
        claimed.publish();
    }

    fn commit(&self, sequence: i64, policy: PublishPolicy) {
        match policy {
            PublishPolicy::Append => self.sequencer.wait_for_cursor(sequence - 1, &self.cursor),
            PublishPolicy::Explicit => self.sequencer.set_sequence(sequence + 1),
        }
        self.cursor.set(sequence);
        self.wait_strategy.signal_all();
    }

    /// Read the slot for `sequence`
    ///
    /// Only sequences at or below a value returned by a barrier's `wait_for`
    /// hold published data. The returned reference stays valid while the
    /// reader's own sequence is in the gating set
    /// ([`add_gating_sequences`](Self::add_gating_sequences)) and has not
    /// moved past `sequence`: that is what keeps a producer from wrapping
    /// around and rewriting the slot underneath it. Readers that do not gate
    /// must not hold the reference once producers may have lapped them.
    pub fn get(&self, sequence: i64) -> &Slot<T> {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: index is masked into bounds; published slots are not written
        // until every gating consumer has moved past them.
        unsafe { &*self.slots.get_unchecked(index).get() }
    }

    /// Highest published sequence
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// Number of slots, always a power of two
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether this ring was built for one or several producers
    pub fn producer_type(&self) -> ProducerType {
        self.sequencer.producer_type()
    }

    /// The claim-side sequencer, for inspecting gating and claim settings
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Claims that can still succeed before the slowest gating consumer blocks producers
    ///
    /// A producer stays strictly less than `capacity - reserve_threshold`
    /// sequences ahead of that consumer. With nothing gating, claims never
    /// block and the full capacity is reported.
    pub fn remaining_capacity(&self) -> i64 {
        if self.sequencer.gating_sequence_count() == 0 {
            return self.capacity() as i64;
        }

        let produced = self.sequencer.next_sequence() - 1;
        let consumed = self.sequencer.minimum_gating_sequence(produced);
        let window = (self.capacity() - self.sequencer.reserve_threshold()) as i64;
        (window - 1 - (produced - consumed)).max(0)
    }

    /// Create a barrier that tracks the cursor and `dependents`
    pub fn create_barrier(&self, dependents: Vec<Arc<Sequence>>) -> Arc<ProcessingSequenceBarrier> {
        Arc::new(ProcessingSequenceBarrier::new(
            Arc::clone(&self.cursor),
            Arc::clone(&self.wait_strategy),
            dependents,
        ))
    }

    /// Keep producers from overtaking `sequences`
    ///
    /// # Errors
    /// `InvalidConsumerSet` when `sequences` is empty
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) -> Result<()> {
        self.sequencer.add_gating_sequences(sequences)
    }

    /// Stop gating on `sequence`; returns whether it was gating
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Slowest gating consumer, or the cursor when nothing gates
    pub fn minimum_gating_sequence(&self) -> i64 {
        self.sequencer.minimum_gating_sequence(self.cursor.get())
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.slots.len())
            .field("cursor", &self.cursor.get())
            .field("sequencer", &self.sequencer)
            .finish()
    }
}

/// A slot claimed by a producer and not yet published
///
/// Dereferences to the event so it can be filled in place. Dropping it
/// without publishing leaves the sequence unpublished.
#[must_use = "a claimed slot must be published"]
pub struct ClaimedSlot<'a, T>
where
    T: Send + Sync,
{
    ring_buffer: &'a RingBuffer<T>,
    slot: NonNull<Slot<T>>,
    sequence: i64,
    policy: PublishPolicy,
    _slot: PhantomData<&'a mut Slot<T>>,
}

impl<'a, T> ClaimedSlot<'a, T>
where
    T: Send + Sync,
{
    /// The sequence this slot was claimed for
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// The claimed slot, including its sequence stamp
    pub fn slot(&self) -> &Slot<T> {
        // SAFETY: the claim is exclusive and `&self` rules out a live `&mut`.
        unsafe { self.slot.as_ref() }
    }

    /// Publish the slot, making it visible to consumers
    pub fn publish(self) {
        self.ring_buffer.commit(self.sequence, self.policy);
    }
}

impl<T> Drop for ClaimedSlot<'_, T>
where
    T: Send + Sync,
{
    fn drop(&mut self) {
        self.ring_buffer.sequencer.end_claim();
    }
}

impl<T> Deref for ClaimedSlot<'_, T>
where
    T: Send + Sync,
{
    type Target = T;

    fn deref(&self) -> &T {
        self.slot().event()
    }
}

impl<T> DerefMut for ClaimedSlot<'_, T>
where
    T: Send + Sync,
{
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the claim is exclusive and `&mut self` rules out any other
        // reference handed out by this claim.
        unsafe { self.slot.as_mut() }.event_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        event_factory, BlockingWaitStrategy, DefaultEventFactory, SequenceBarrier,
        YieldingWaitStrategy,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct StubEvent {
        value: i64,
    }

    fn ring(capacity: usize) -> RingBuffer<StubEvent> {
        RingBuffer::new(
            DefaultEventFactory::<StubEvent>::new(),
            capacity,
            ProducerType::Single,
            WaitStrategy::Blocking(BlockingWaitStrategy::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_capacity_rounds_up() {
        assert_eq!(ring(20).capacity(), 32);
        assert_eq!(ring(1024).capacity(), 1024);
        assert_eq!(ring(1).capacity(), 1);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = RingBuffer::new(
            DefaultEventFactory::<StubEvent>::new(),
            0,
            ProducerType::Single,
            WaitStrategy::default(),
        );
        assert!(matches!(result, Err(DisruptorError::InvalidCapacity(0))));
    }

    #[test]
    fn test_factory_called_once_per_slot() {
        let calls = AtomicUsize::new(0);
        let ring = RingBuffer::new(
            event_factory(|| {
                calls.fetch_add(1, Ordering::Relaxed);
                StubEvent::default()
            }),
            5,
            ProducerType::Single,
            WaitStrategy::default(),
        )
        .unwrap();

        assert_eq!(ring.capacity(), 8);
        assert_eq!(calls.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn test_claim_and_publish_moves_cursor() {
        let ring = ring(16);
        assert_eq!(ring.cursor(), -1);

        let mut claimed = ring.claim_next();
        assert_eq!(claimed.sequence(), 0);
        claimed.value = 2701;
        ring.publish(claimed);

        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.get(0).value, 2701);
        assert_eq!(ring.get(0).sequence(), 0);
    }

    #[test]
    fn test_read_after_wrap_returns_latest_data() {
        let ring = ring(8);
        let offset = 3;
        for i in 0..(8 + offset) {
            let mut claimed = ring.claim_next();
            claimed.value = i;
            claimed.publish();
        }

        for i in offset..(8 + offset) {
            let slot = ring.get(i);
            assert_eq!(slot.sequence(), i);
            assert_eq!(slot.value, i);
        }
    }

    #[test]
    fn test_claim_specific_resets_claim_counter() {
        let ring = ring(16);
        let mut claimed = unsafe { ring.claim_specific(5) };
        claimed.value = 5;
        claimed.publish();

        assert_eq!(ring.cursor(), 5);
        assert_eq!(ring.get(5).value, 5);
        assert_eq!(ring.claim_next().sequence(), 6);
    }

    #[test]
    fn test_barrier_sees_published_sequence() {
        let ring = ring(16);
        let barrier = ring.create_barrier(Vec::new());
        for i in 0..4 {
            let mut claimed = ring.claim_next();
            claimed.value = i * 10;
            claimed.publish();
        }

        assert_eq!(barrier.wait_for(3).unwrap(), 3);
        assert_eq!(ring.get(2).value, 20);
    }

    #[test]
    fn test_gating_and_remaining_capacity() {
        let ring = ring(8);
        assert_eq!(ring.remaining_capacity(), 8);
        assert!(matches!(
            ring.add_gating_sequences(&[]),
            Err(DisruptorError::InvalidConsumerSet)
        ));

        let consumer = Arc::new(Sequence::default());
        ring.add_gating_sequences(&[consumer.clone()]).unwrap();
        assert_eq!(ring.remaining_capacity(), 7);
        for _ in 0..3 {
            ring.claim_next().publish();
        }

        assert_eq!(ring.minimum_gating_sequence(), -1);
        assert_eq!(ring.remaining_capacity(), 4);

        consumer.set(2);
        assert_eq!(ring.remaining_capacity(), 7);
        assert!(ring.remove_gating_sequence(&consumer));
        assert_eq!(ring.minimum_gating_sequence(), 2);
        assert_eq!(ring.remaining_capacity(), 8);
    }

    #[test]
    fn test_remaining_capacity_matches_claims_before_blocking() {
        let config = RingBufferConfig::new(8).reserve_threshold(2);
        let ring: Arc<RingBuffer<StubEvent>> =
            Arc::new(RingBuffer::with_config(DefaultEventFactory::new(), &config).unwrap());
        let consumer = Arc::new(Sequence::default());
        ring.add_gating_sequences(&[consumer.clone()]).unwrap();

        let remaining = ring.remaining_capacity();
        assert_eq!(remaining, 5);
        for _ in 0..remaining {
            ring.claim_next().publish();
        }
        assert_eq!(ring.remaining_capacity(), 0);

        let claimed = Arc::new(AtomicBool::new(false));
        let producer = {
            let ring = Arc::clone(&ring);
            let claimed = Arc::clone(&claimed);
            thread::spawn(move || {
                ring.claim_next().publish();
                claimed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!claimed.load(Ordering::SeqCst));

        consumer.set(0);
        producer.join().unwrap();
        assert!(claimed.load(Ordering::SeqCst));
        assert_eq!(ring.cursor(), remaining);
    }

    #[test]
    #[should_panic(expected = "another claim is outstanding")]
    fn test_single_producer_rejects_second_live_claim() {
        let ring = ring(8);
        let _first = ring.claim_next();
        let _second = ring.claim_next();
    }

    #[test]
    fn test_dropped_claim_frees_single_producer() {
        let ring = ring(8);
        drop(ring.claim_next());

        let mut claimed = ring.claim_next();
        assert_eq!(claimed.sequence(), 1);
        claimed.value = 11;
        claimed.publish();
        assert_eq!(ring.get(1).value, 11);
    }

    #[test]
    fn test_claimed_slot_is_stamped_with_sequence() {
        let ring = ring(4);
        for _ in 0..5 {
            ring.claim_next().publish();
        }

        let claimed = ring.claim_next();
        assert_eq!(claimed.sequence(), 5);
        assert_eq!(claimed.slot().sequence(), 5);
        claimed.publish();
    }

    #[test]
    fn test_multi_producer_publishes_without_gaps() {
        let ring = Arc::new(
            RingBuffer::new(
                DefaultEventFactory::<StubEvent>::new(),
                1024,
                ProducerType::Multi,
                WaitStrategy::Yielding(YieldingWaitStrategy::new()),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut claimed = ring.claim_next();
                        let sequence = claimed.sequence();
                        claimed.value = sequence;
                        claimed.publish();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ring.cursor(), 399);
        for sequence in 0..400 {
            assert_eq!(ring.get(sequence).value, sequence);
        }
    }

    #[test]
    fn test_with_config_applies_reserve() {
        let config = RingBufferConfig::new(8).reserve_threshold(3);
        let ring: RingBuffer<StubEvent> =
            RingBuffer::with_config(DefaultEventFactory::new(), &config).unwrap();
        assert_eq!(ring.sequencer().reserve_threshold(), 3);

        let bad = RingBufferConfig::new(8).reserve_threshold(8);
        assert!(RingBuffer::<StubEvent>::with_config(DefaultEventFactory::new(), &bad).is_err());
    }
}
