//! Event Processor implementation for the Disruptor
//!
//! A [`BatchEventProcessor`] is the consumer side of a ring buffer: it waits on
//! its barrier, hands every newly available slot to its [`EventHandler`] and
//! then advances its own sequence so producers and downstream consumers can
//! follow.

use crate::disruptor::{
    DisruptorError, EventHandler, ExceptionHandler, FatalExceptionHandler, ProgressTracker,
    Result, RingBuffer, Sequence, SequenceBarrier,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Lifecycle states shared between a processor and its handles
const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const HALTED: u8 = 2;

/// A consumer loop that can be run on its own thread
pub trait EventProcessor: Send {
    /// The sequence this processor has consumed up to
    fn sequence(&self) -> Arc<Sequence>;

    /// Ask the processor to stop once its current batch is done
    fn halt(&self);

    /// Whether the processing loop is currently active
    fn is_running(&self) -> bool;

    /// Run the processing loop until halted or a fatal failure
    ///
    /// A processor that has returned from `run` may be run again and carries
    /// on after the last sequence it consumed.
    fn run(&mut self) -> Result<()>;
}

/// Drains every available slot in one go before going back to its barrier
///
/// The processor starts idle. `run` moves it to running until a halt or a
/// fatal failure, after which it is idle again and can be restarted.
pub struct BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: Arc<dyn SequenceBarrier>,
    handler: H,
    exception_handler: Box<dyn ExceptionHandler<T>>,
    sequence: Arc<Sequence>,
    state: Arc<AtomicU8>,
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    /// Create a processor reading `ring_buffer` through `barrier`
    ///
    /// Failures are fatal until another policy is installed with
    /// [`set_exception_handler`](Self::set_exception_handler).
    pub fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: Arc<dyn SequenceBarrier>,
        mut handler: H,
    ) -> Self {
        let sequence = Arc::new(Sequence::new_with_initial_value());
        if handler.tracks_progress() {
            handler.set_progress_tracker(ProgressTracker::new(Arc::clone(&sequence)));
        }

        Self {
            ring_buffer,
            barrier,
            handler,
            exception_handler: Box::new(FatalExceptionHandler::new()),
            sequence,
            state: Arc::new(AtomicU8::new(IDLE)),
        }
    }

    /// Replace the failure policy
    pub fn set_exception_handler<E>(&mut self, exception_handler: E)
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.exception_handler = Box::new(exception_handler);
    }

    /// A handle for halting and observing the processor from other threads
    pub fn handle(&self) -> ProcessorHandle {
        ProcessorHandle {
            sequence: Arc::clone(&self.sequence),
            state: Arc::clone(&self.state),
            barrier: Arc::clone(&self.barrier),
        }
    }

    /// The wrapped event handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Give back the event handler, typically after `run` has returned
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn process_batch(&mut self, next: i64, available: i64) -> Result<()> {
        let tracks_progress = self.handler.tracks_progress();

        for sequence in next..=available {
            let slot = self.ring_buffer.get(sequence);
            if let Err(source) = self.handler.on_event(slot) {
                self.exception_handler
                    .handle_event_exception(DisruptorError::HandlerFailure { sequence, source }, slot)?;
            }
            if !tracks_progress {
                self.sequence.set(sequence);
            }
        }

        if let Err(source) = self.handler.on_end_of_batch() {
            self.exception_handler.handle_event_exception(
                DisruptorError::HandlerFailure {
                    sequence: available,
                    source,
                },
                self.ring_buffer.get(available),
            )?;
        }
        Ok(())
    }

    fn stop_with(&self, err: DisruptorError) -> Result<()> {
        self.state.store(IDLE, Ordering::Release);
        error!(
            sequence = self.sequence.get(),
            error = %err,
            "event processor stopped by a fatal failure"
        );
        Err(err)
    }
}

impl<T, H> EventProcessor for BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn halt(&self) {
        self.handle().halt();
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    fn run(&mut self) -> Result<()> {
        if let Err(state) = self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            if state == HALTED {
                // halted before this run started
                self.state.store(IDLE, Ordering::Release);
                self.handler.on_completion();
                debug!(sequence = self.sequence.get(), "event processor completed");
                return Ok(());
            }
        }
        // a halt from a previous run leaves the barrier alerted
        self.barrier.clear_alert();

        let mut next = self.sequence.get() + 1;
        debug!(next, "event processor started");

        while self.state.load(Ordering::Acquire) == RUNNING {
            match self.barrier.wait_for(next) {
                Ok(available) if available >= next => {
                    if let Err(err) = self.process_batch(next, available) {
                        return self.stop_with(err);
                    }
                    next = available + 1;
                }
                Ok(_) | Err(DisruptorError::Alert) => {}
                Err(err) => {
                    let handled = self
                        .exception_handler
                        .handle_event_exception(err, self.ring_buffer.get(next));
                    if let Err(err) = handled {
                        return self.stop_with(err);
                    }
                }
            }
        }

        self.state.store(IDLE, Ordering::Release);
        self.handler.on_completion();
        debug!(sequence = self.sequence.get(), "event processor completed");
        Ok(())
    }
}

/// Cloneable control handle for a [`BatchEventProcessor`]
#[derive(Clone)]
pub struct ProcessorHandle {
    sequence: Arc<Sequence>,
    state: Arc<AtomicU8>,
    barrier: Arc<dyn SequenceBarrier>,
}

impl ProcessorHandle {
    /// Stop the processor and wake it if it is waiting for data
    ///
    /// Halting an idle processor makes its next `run` return at once.
    pub fn halt(&self) {
        self.state.store(HALTED, Ordering::Release);
        self.barrier.alert();
        info!(sequence = self.sequence.get(), "event processor halted");
    }

    /// Whether the processor's loop is currently active
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// The sequence the processor has consumed up to
    pub fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }
}

impl std::fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("sequence", &self.sequence.get())
            .field("running", &self.is_running())
            .finish()
    }
}
