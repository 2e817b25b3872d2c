//! Wait Strategy Implementation
//!
//! Wait strategies decide how a consumer passes the time while the sequence it
//! asked for has not been published yet. They trade CPU usage against wake-up
//! latency; only the blocking variant actually sleeps.

use crate::disruptor::{Result, Sequence, SequenceBarrier};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Tries spent spinning before the yielding strategy starts giving up its slice
const SPIN_TRIES: u32 = 100;

/// The set of strategies a ring buffer can be built with
#[derive(Debug)]
pub enum WaitStrategy {
    Blocking(BlockingWaitStrategy),
    Yielding(YieldingWaitStrategy),
    BusySpin(BusySpinWaitStrategy),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Blocking(BlockingWaitStrategy::new())
    }
}

impl WaitStrategy {
    /// Wait until `sequence` is available to a consumer
    ///
    /// The cursor has to reach `sequence` first; when `dependents` is not
    /// empty the slowest of them must then reach it as well.
    ///
    /// # Returns
    /// The highest available sequence, which may be beyond `sequence`
    ///
    /// # Errors
    /// `Alert` as soon as the barrier is alerted
    pub fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        self.wait_until(sequence, cursor, dependents, barrier, None)
    }

    /// Same as [`wait_for`](Self::wait_for), giving up after `timeout`
    ///
    /// On timeout the best known available sequence is returned, which is
    /// lower than `sequence`.
    pub fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        self.wait_until(sequence, cursor, dependents, barrier, Some(deadline))
    }

    /// Wake every consumer parked in this strategy
    ///
    /// Called on every publish and alert. Spinning strategies poll on their
    /// own so this only does work for [`BlockingWaitStrategy`].
    pub fn signal_all(&self) {
        if let WaitStrategy::Blocking(strategy) = self {
            strategy.signal_all();
        }
    }

    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        barrier.check_alert()?;

        let reached = match self {
            WaitStrategy::Blocking(strategy) => {
                strategy.wait_for_cursor(sequence, cursor, barrier, deadline)?
            }
            WaitStrategy::Yielding(_) | WaitStrategy::BusySpin(_) => {
                self.spin_until(barrier, deadline, || cursor.get() >= sequence)?
            }
        };

        if reached && !dependents.is_empty() {
            self.spin_until(barrier, deadline, || {
                Sequence::get_minimum_sequence(dependents, i64::MAX) >= sequence
            })?;
        }

        Ok(Sequence::get_minimum_sequence(dependents, cursor.get()))
    }

    /// Poll `ready` until it holds, the barrier is alerted or `deadline` passes
    ///
    /// # Returns
    /// False if the deadline passed first
    fn spin_until(
        &self,
        barrier: &dyn SequenceBarrier,
        deadline: Option<Instant>,
        ready: impl Fn() -> bool,
    ) -> Result<bool> {
        let mut counter = SPIN_TRIES;
        while !ready() {
            barrier.check_alert()?;
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(false);
            }

            match self {
                WaitStrategy::Yielding(_) => {
                    if counter == 0 {
                        thread::yield_now();
                    } else {
                        counter -= 1;
                    }
                }
                WaitStrategy::Blocking(_) | WaitStrategy::BusySpin(_) => std::hint::spin_loop(),
            }
        }
        Ok(true)
    }
}

/// Parks consumers on a condition variable until a producer signals
///
/// Slowest to wake up but leaves the CPU free, so it suits pipelines where
/// throughput and latency matter less than the cores they run on.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create the strategy with its own lock and condition variable
    pub fn new() -> Self {
        Self::default()
    }

    fn wait_for_cursor(
        &self,
        sequence: i64,
        cursor: &Sequence,
        barrier: &dyn SequenceBarrier,
        deadline: Option<Instant>,
    ) -> Result<bool> {
        if cursor.get() >= sequence {
            return Ok(true);
        }

        let mut guard = self.mutex.lock();
        while cursor.get() < sequence {
            barrier.check_alert()?;
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        return Ok(cursor.get() >= sequence);
                    }
                }
                None => self.condvar.wait(&mut guard),
            }
        }
        Ok(true)
    }

    /// Broadcast to every parked consumer
    ///
    /// Taking the lock first means a consumer that has checked the cursor but
    /// not yet parked cannot miss the notification.
    pub fn signal_all(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Spins for a while, then yields the thread on every poll
///
/// A compromise between latency and CPU usage that does well when consumer
/// threads do not outnumber the cores.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWaitStrategy;

impl YieldingWaitStrategy {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

/// Spins on the cursor without ever giving up the core
///
/// Lowest latency, but each waiting consumer burns a full CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{DisruptorError, ProcessingSequenceBarrier};

    fn barrier(strategy: &Arc<WaitStrategy>, cursor: &Arc<Sequence>) -> ProcessingSequenceBarrier {
        ProcessingSequenceBarrier::new(Arc::clone(cursor), Arc::clone(strategy), Vec::new())
    }

    fn all_strategies() -> Vec<Arc<WaitStrategy>> {
        vec![
            Arc::new(WaitStrategy::Blocking(BlockingWaitStrategy::new())),
            Arc::new(WaitStrategy::Yielding(YieldingWaitStrategy::new())),
            Arc::new(WaitStrategy::BusySpin(BusySpinWaitStrategy::new())),
        ]
    }

    #[test]
    fn test_returns_immediately_when_available() {
        for strategy in all_strategies() {
            let cursor = Arc::new(Sequence::new(5));
            let barrier = barrier(&strategy, &cursor);
            assert_eq!(strategy.wait_for(3, &cursor, &[], &barrier).unwrap(), 5);
        }
    }

    #[test]
    fn test_timeout_on_empty_cursor() {
        for strategy in all_strategies() {
            let cursor = Arc::new(Sequence::default());
            let barrier = barrier(&strategy, &cursor);
            let available = strategy
                .wait_for_timeout(0, &cursor, &[], &barrier, Duration::from_millis(5))
                .unwrap();
            assert_eq!(available, -1);
        }
    }

    #[test]
    fn test_dependents_bound_available_sequence() {
        for strategy in all_strategies() {
            let cursor = Arc::new(Sequence::new(10));
            let dependents = vec![Arc::new(Sequence::new(7)), Arc::new(Sequence::new(4))];
            let barrier = barrier(&strategy, &cursor);
            assert_eq!(strategy.wait_for(4, &cursor, &dependents, &barrier).unwrap(), 4);

            let available = strategy
                .wait_for_timeout(6, &cursor, &dependents, &barrier, Duration::from_millis(5))
                .unwrap();
            assert_eq!(available, 4);
        }
    }

    #[test]
    fn test_alerted_barrier_fails_fast() {
        for strategy in all_strategies() {
            let cursor = Arc::new(Sequence::default());
            let barrier = barrier(&strategy, &cursor);
            barrier.alert();
            assert!(matches!(
                strategy.wait_for(0, &cursor, &[], &barrier),
                Err(DisruptorError::Alert)
            ));
        }
    }

    #[test]
    fn test_blocking_wakes_on_publish() {
        let strategy = Arc::new(WaitStrategy::Blocking(BlockingWaitStrategy::new()));
        let cursor = Arc::new(Sequence::default());
        let barrier = Arc::new(barrier(&strategy, &cursor));

        let handle = {
            let strategy = Arc::clone(&strategy);
            let cursor = Arc::clone(&cursor);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || strategy.wait_for(0, &cursor, &[], barrier.as_ref()))
        };

        thread::sleep(Duration::from_millis(20));
        cursor.set(0);
        strategy.signal_all();

        assert_eq!(handle.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn test_signal_all_is_noop_for_spinning() {
        let strategy = WaitStrategy::BusySpin(BusySpinWaitStrategy::new());
        strategy.signal_all();
        assert!(matches!(WaitStrategy::default(), WaitStrategy::Blocking(_)));
    }
}
