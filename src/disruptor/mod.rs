//! Slotring Disruptor Implementation
//!
//! This module provides the sequencing and coordination core: the ring buffer
//! and its cursor, the single and multi producer claim strategies, the
//! consumer-side sequence barrier, the pluggable wait strategies and the batch
//! event processor that drains published entries into user handlers.

pub mod config;
pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod exception_handler;
pub mod producer_type;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod slot;
pub mod thread_management;
pub mod wait_strategy;


pub use config::{ClaimWait, RingBufferConfig, WaitStrategyKind};
pub use event_factory::{
    event_factory, CloneEventFactory, ClosureEventFactory, DefaultEventFactory, EventFactory,
};
pub use event_handler::{
    ClosureEventHandler, EventHandler, HandlerResult, NoOpEventHandler, ProgressTracker,
};
pub use event_processor::{BatchEventProcessor, EventProcessor, ProcessorHandle};
pub use exception_handler::{
    ClosureExceptionHandler, ExceptionHandler, FatalExceptionHandler, IgnoreExceptionHandler,
};
pub use producer_type::ProducerType;
pub use ring_buffer::{ClaimedSlot, RingBuffer};
pub use sequence::Sequence;
pub use sequence_barrier::{ProcessingSequenceBarrier, SequenceBarrier};
pub use sequencer::Sequencer;
pub use slot::Slot;
pub use thread_management::{ManagedThread, ThreadBuilder};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};

/// The initial cursor value for sequences
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("Invalid buffer capacity: {0}")]
    InvalidCapacity(usize),

    #[error("Reserve threshold {reserve} must be smaller than the capacity {capacity}")]
    InvalidReserveThreshold { reserve: usize, capacity: usize },

    #[error("There must be at least one consumer sequence to track for preventing ring wrap")]
    InvalidConsumerSet,

    /// Cooperative cancellation raised by [`SequenceBarrier::alert`].
    ///
    /// Carries no payload so that signalling it never allocates.
    #[error("Sequence barrier has been alerted")]
    Alert,

    #[error("Event handler failed at sequence {sequence}")]
    HandlerFailure {
        sequence: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Calculate the next power of 2, greater than or equal to `x`
///
/// Returns `None` for zero and when the result would not fit in a `usize`.
pub fn ceiling_next_power_of_two(x: usize) -> Option<usize> {
    if x == 0 {
        return None;
    }
    x.checked_next_power_of_two()
}
