//! Event Handler Implementation
//!
//! User code plugs into a [`BatchEventProcessor`](crate::disruptor::BatchEventProcessor)
//! through the [`EventHandler`] trait. Handlers are called on the consumer
//! thread in sequence order, once per published slot.

use crate::disruptor::{Sequence, Slot};
use std::sync::Arc;

/// Result of a handler callback; any error is routed to the exception handler
pub type HandlerResult = anyhow::Result<()>;

/// Handler for processing events published to a ring buffer
///
/// # Type Parameters
/// * `T` - The event type that will be processed
///
/// # Examples
/// ```
/// use slotring::disruptor::{EventHandler, HandlerResult, Slot};
///
/// #[derive(Default)]
/// struct MyEvent {
///     data: i32,
/// }
///
/// struct Summer {
///     total: i64,
/// }
///
/// impl EventHandler<MyEvent> for Summer {
///     fn on_event(&mut self, slot: &Slot<MyEvent>) -> HandlerResult {
///         self.total += i64::from(slot.data);
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler<T>: Send {
    /// Process one published slot
    fn on_event(&mut self, slot: &Slot<T>) -> HandlerResult;

    /// Called after the last slot of every batch
    ///
    /// A good place to flush work accumulated over the batch.
    fn on_end_of_batch(&mut self) -> HandlerResult {
        Ok(())
    }

    /// Called once when the processor stops after being halted
    fn on_completion(&mut self) {}

    /// Whether the handler reports its own progress through a [`ProgressTracker`]
    ///
    /// When true the processor no longer advances its sequence after each
    /// slot; the handler decides when entries count as consumed.
    fn tracks_progress(&self) -> bool {
        false
    }

    /// Receive the tracker for the processor's sequence
    ///
    /// Only called when [`tracks_progress`](Self::tracks_progress) returns true.
    fn set_progress_tracker(&mut self, _tracker: ProgressTracker) {}
}

/// Lets a handler release slots to producers and downstream consumers itself
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    sequence: Arc<Sequence>,
}

impl ProgressTracker {
    pub(crate) fn new(sequence: Arc<Sequence>) -> Self {
        Self { sequence }
    }

    /// Mark every slot up to and including `sequence` as consumed
    pub fn on_completed(&self, sequence: i64) {
        self.sequence.set(sequence);
    }

    /// The last sequence reported as consumed
    pub fn completed(&self) -> i64 {
        self.sequence.get()
    }
}

/// An event handler built from a closure
pub struct ClosureEventHandler<T, F>
where
    F: FnMut(&Slot<T>) -> HandlerResult + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&Slot<T>) -> HandlerResult + Send,
{
    /// Wrap `handler`, which is called once per event
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    F: FnMut(&Slot<T>) -> HandlerResult + Send,
{
    fn on_event(&mut self, slot: &Slot<T>) -> HandlerResult {
        (self.handler)(slot)
    }
}

/// Handler that drops every event, for measuring the plumbing alone
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventHandler;

impl NoOpEventHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

impl<T> EventHandler<T> for NoOpEventHandler {
    fn on_event(&mut self, _slot: &Slot<T>) -> HandlerResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_handler_sees_slot() {
        let mut seen = Vec::new();
        {
            let mut handler = ClosureEventHandler::new(|slot: &Slot<i64>| {
                seen.push((slot.sequence(), **slot));
                Ok(())
            });
            let mut slot = Slot::new(7);
            slot.set_sequence(3);
            handler.on_event(&slot).unwrap();
            assert!(handler.on_end_of_batch().is_ok());
            assert!(!handler.tracks_progress());
        }
        assert_eq!(seen, vec![(3, 7)]);
    }

    #[test]
    fn test_closure_handler_error_passes_through() {
        let mut handler =
            ClosureEventHandler::new(|_slot: &Slot<u8>| Err(anyhow::anyhow!("bad payload")));
        let error = handler.on_event(&Slot::new(0)).unwrap_err();
        assert_eq!(error.to_string(), "bad payload");
    }

    #[test]
    fn test_progress_tracker_writes_sequence() {
        let sequence = Arc::new(Sequence::default());
        let tracker = ProgressTracker::new(Arc::clone(&sequence));
        tracker.on_completed(41);
        assert_eq!(sequence.get(), 41);
        assert_eq!(tracker.clone().completed(), 41);
    }

    #[test]
    fn test_noop_handler() {
        let mut handler = NoOpEventHandler::new();
        assert!(EventHandler::<u32>::on_event(&mut handler, &Slot::new(1)).is_ok());
    }
}
