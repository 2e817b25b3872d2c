//! Thread management and CPU affinity
//!
//! Consumers run one per thread. This module names those threads, optionally
//! pins them to a CPU core and hands back a [`ManagedThread`] that yields the
//! processor's result when joined.

use crate::disruptor::{EventProcessor, Result};
use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Naming and affinity settings for the next spawned thread
#[derive(Debug, Clone, Default)]
struct ThreadContext {
    affinity: Option<CoreId>,
    name: Option<String>,
    /// Counter for automatic naming
    id: usize,
}

impl ThreadContext {
    fn next_name(&mut self) -> String {
        self.name.take().unwrap_or_else(|| {
            self.id += 1;
            format!("processor-{id}", id = self.id)
        })
    }

    fn take_affinity(&mut self) -> Option<CoreId> {
        self.affinity.take()
    }
}

/// A spawned thread that is joined when dropped
pub struct ManagedThread<R = ()> {
    join_handle: Option<JoinHandle<R>>,
    thread_name: String,
}

impl<R> ManagedThread<R> {
    fn new(join_handle: JoinHandle<R>, thread_name: String) -> Self {
        Self {
            join_handle: Some(join_handle),
            thread_name,
        }
    }

    /// Name the thread was spawned with
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread to finish and return what it produced
    ///
    /// The outer error carries the panic payload if the thread panicked.
    pub fn join(mut self) -> thread::Result<Option<R>> {
        match self.join_handle.take() {
            Some(handle) => handle.join().map(Some),
            None => Ok(None),
        }
    }

    /// Whether the thread has not finished yet
    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<R> Drop for ManagedThread<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Thread builder with CPU affinity and naming support
///
/// Threads without an explicit name are called `processor-1`, `processor-2`
/// and so on, counting per builder.
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    context: ThreadContext,
}

impl ThreadBuilder {
    /// Builder with no name or affinity set
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the next spawned thread to `core_id`
    ///
    /// A core that cannot be used is reported when the thread starts and the
    /// thread runs unpinned.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.context.affinity = Some(CoreId { id: core_id });
        self
    }

    /// Name the next spawned thread
    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.context.name = Some(name.into());
        self
    }

    /// Spawn `f` on a new thread with the configured settings
    pub fn spawn<F, R>(&mut self, f: F) -> std::io::Result<ManagedThread<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let thread_name = self.context.next_name();
        let affinity = self.context.take_affinity();

        let name = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                set_affinity_if_defined(affinity, &name);
                f()
            })?;

        Ok(ManagedThread::new(join_handle, thread_name))
    }

    /// Run `processor` on its own thread
    ///
    /// Joining the returned thread yields the processor's `run` result.
    pub fn spawn_processor<P>(
        &mut self,
        mut processor: P,
    ) -> std::io::Result<ManagedThread<Result<()>>>
    where
        P: EventProcessor + 'static,
    {
        self.spawn(move || processor.run())
    }
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if !get_available_cores().contains(&core_id.id) {
            warn!(
                thread = thread_name,
                core = core_id.id,
                "core is not available, running unpinned"
            );
        } else if core_affinity::set_for_current(core_id) {
            debug!(thread = thread_name, core = core_id.id, "pinned thread to core");
        } else {
            warn!(thread = thread_name, core = core_id.id, "could not pin thread to core");
        }
    }
}

/// CPU core IDs available to this process
pub fn get_available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .iter()
        .map(|core| core.id)
        .collect()
}
