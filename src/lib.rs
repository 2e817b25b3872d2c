//! `Slotring` - Inter-thread event exchange on a pre-allocated ring
//!
//! A fixed-capacity circular buffer lets one or more producer threads hand
//! reusable slots to one or more consumer threads without allocating or
//! taking a lock per event. It follows the LMAX Disruptor design
//! (<https://github.com/LMAX-Exchange/disruptor>).
//!
//! ## Features
//!
//! - **Pre-allocated**: every slot is created once, up front, by an event factory
//! - **Ordered publishing**: consumers see sequences in claim order, across producers
//! - **Backpressure**: producers never lap a gating consumer
//! - **Batching**: consumers drain everything available before waiting again
//! - **Cooperative shutdown**: a halted consumer is woken even while it waits
//!
//! ## Quick Start
//!
//! ```rust
//! use slotring::disruptor::{
//!     BatchEventProcessor, DefaultEventFactory, EventHandler, EventProcessor, HandlerResult,
//!     ProducerType, RingBuffer, Slot, ThreadBuilder, WaitStrategy,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct MyEvent {
//!     value: i64,
//! }
//!
//! #[derive(Default)]
//! struct Summer {
//!     total: i64,
//! }
//!
//! impl EventHandler<MyEvent> for Summer {
//!     fn on_event(&mut self, slot: &Slot<MyEvent>) -> HandlerResult {
//!         self.total += slot.value;
//!         Ok(())
//!     }
//! }
//!
//! let ring = Arc::new(
//!     RingBuffer::new(
//!         DefaultEventFactory::<MyEvent>::new(),
//!         1000, // rounded up to 1024
//!         ProducerType::Single,
//!         WaitStrategy::default(),
//!     )
//!     .unwrap(),
//! );
//!
//! let processor = BatchEventProcessor::new(
//!     Arc::clone(&ring),
//!     ring.create_barrier(Vec::new()),
//!     Summer::default(),
//! );
//! ring.add_gating_sequences(&[processor.sequence()]).unwrap();
//! let handle = processor.handle();
//! let consumer = ThreadBuilder::new().spawn_processor(processor).unwrap();
//!
//! for i in 0..100 {
//!     let mut claimed = ring.claim_next();
//!     claimed.value = i;
//!     claimed.publish();
//! }
//!
//! while handle.sequence().get() < 99 {
//!     std::thread::yield_now();
//! }
//! handle.halt();
//! assert!(consumer.join().unwrap().unwrap().is_ok());
//! ```
//!
//! ## Architecture
//!
//! - **`RingBuffer`**: slot storage, the published cursor and claim/publish
//! - **`Sequence`**: cache-line padded atomic counters
//! - **`Sequencer`**: single or multi producer claiming plus consumer gating
//! - **`SequenceBarrier`**: how far a consumer may read, and its alert flag
//! - **`WaitStrategy`**: blocking, yielding or busy-spin waiting
//! - **`BatchEventProcessor`**: the consumer loop driving an `EventHandler`

pub mod disruptor;

pub use disruptor::{
    // Utility functions
    ceiling_next_power_of_two,
    is_power_of_two,
    // Event processing
    BatchEventProcessor,
    // Wait strategies
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    ClaimWait,
    ClaimedSlot,
    DefaultEventFactory,
    // Error types
    DisruptorError,
    EventFactory,
    EventHandler,
    EventProcessor,
    ExceptionHandler,
    FatalExceptionHandler,
    HandlerResult,
    IgnoreExceptionHandler,
    ProcessorHandle,
    ProducerType,
    ProgressTracker,
    Result,
    // Core types
    RingBuffer,
    RingBufferConfig,
    Sequence,
    SequenceBarrier,
    Sequencer,
    Slot,
    ThreadBuilder,
    WaitStrategy,
    WaitStrategyKind,
    YieldingWaitStrategy,
    // Constants
    INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `Slotring` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
