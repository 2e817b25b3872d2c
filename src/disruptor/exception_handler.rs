//! Exception Handler Implementation
//!
//! When an event handler fails, the batch event processor passes the error and
//! the slot it failed on to an [`ExceptionHandler`]. The handler decides
//! whether the consumer carries on or stops.

use crate::disruptor::{DisruptorError, Result, Slot};
use tracing::{error, info};

/// Policy applied to failures raised while processing events
///
/// Returning `Ok` lets the processor carry on with the next slot. Returning
/// `Err` is fatal: the processor stops and its `run` returns that error.
pub trait ExceptionHandler<T>: Send {
    fn handle_event_exception(&self, error: DisruptorError, slot: &Slot<T>) -> Result<()>;
}

/// Logs the failure and stops the consumer
///
/// This is what a processor uses unless told otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct FatalExceptionHandler;

impl FatalExceptionHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

impl<T> ExceptionHandler<T> for FatalExceptionHandler {
    fn handle_event_exception(&self, err: DisruptorError, slot: &Slot<T>) -> Result<()> {
        error!(sequence = slot.sequence(), error = ?err, "exception processing event");
        Err(err)
    }
}

/// Logs the failure and keeps consuming
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreExceptionHandler;

impl IgnoreExceptionHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler {
    fn handle_event_exception(&self, err: DisruptorError, slot: &Slot<T>) -> Result<()> {
        info!(sequence = slot.sequence(), error = %err, "ignoring exception processing event");
        Ok(())
    }
}

/// An exception handler built from a closure
pub struct ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, &Slot<T>) -> Result<()> + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, &Slot<T>) -> Result<()> + Send,
{
    /// Wrap `handler`; returning `Err` from it stops the consumer
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> ExceptionHandler<T> for ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, &Slot<T>) -> Result<()> + Send,
{
    fn handle_event_exception(&self, error: DisruptorError, slot: &Slot<T>) -> Result<()> {
        (self.handler)(error, slot)
    }
}
