//! Batch draining with pacing and same-batch protection.
//!
//! [`DrainLoop`] fetches and processes batches until the source returns an
//! empty batch or the caller's predicate says stop. Two consecutive
//! identical batches mean the fetch query is not advancing past delivered
//! rows; the loop fails instead of spinning forever.

use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Result, SyncError};
use crate::result::SyncReport;

/// Default pause between two batches of one run.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);

const SAME_BATCH_MESSAGE: &str = "Fetched the same batch twice. Looks like wrong query was used";

/// Shutdown signal shared by every run of a coordinator.
///
/// Once triggered it stays triggered; waits return immediately.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every waiter and fail all future waits.
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` unless triggered first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Interrupted`] if the signal fires before or
    /// during the wait.
    pub fn sleep(&self, timeout: Duration) -> Result<()> {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut triggered = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            triggered = cvar
                .wait_timeout(triggered, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Err(SyncError::Interrupted)
    }
}

/// How a [`DrainLoop`] run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub report: SyncReport,
    /// The source returned an empty batch; false when the predicate stopped the run.
    pub exhausted: bool,
}

/// Fetch/process loop over batches of `T`.
pub struct DrainLoop<T, A, F, P> {
    allow: A,
    fetch: F,
    process: P,
    delay: Duration,
    interrupt: Interrupt,
    _record: PhantomData<fn() -> T>,
}

impl<T, F, P> DrainLoop<T, fn() -> bool, F, P>
where
    T: PartialEq,
    F: FnMut() -> Result<Vec<T>>,
    P: FnMut(&[T]) -> Result<()>,
{
    /// A loop that runs until the source is exhausted.
    pub fn new(fetch: F, process: P) -> Self {
        Self {
            allow: || true,
            fetch,
            process,
            delay: DEFAULT_BATCH_DELAY,
            interrupt: Interrupt::new(),
            _record: PhantomData,
        }
    }
}

impl<T, A, F, P> DrainLoop<T, A, F, P>
where
    T: PartialEq,
    A: FnMut() -> bool,
    F: FnMut() -> Result<Vec<T>>,
    P: FnMut(&[T]) -> Result<()>,
{
    /// Stop before the next fetch once `allow` returns false.
    pub fn allow_while<A2: FnMut() -> bool>(self, allow: A2) -> DrainLoop<T, A2, F, P> {
        DrainLoop {
            allow,
            fetch: self.fetch,
            process: self.process,
            delay: self.delay,
            interrupt: self.interrupt,
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: &Interrupt) -> Self {
        self.interrupt = interrupt.clone();
        self
    }

    /// Drain until an empty batch or until `allow` says stop.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FetchLoop`] when two consecutive batches are
    /// identical (the repeated batch is not processed again),
    /// [`SyncError::Interrupted`] when shutdown is signalled during the
    /// delay, and any error raised by the fetch or process step.
    pub fn run(mut self) -> Result<Drained> {
        let mut report = SyncReport::default();
        let mut previous: Vec<T> = Vec::new();

        while (self.allow)() {
            let batch = (self.fetch)()?;
            if batch.is_empty() {
                return Ok(Drained {
                    report,
                    exhausted: true,
                });
            }
            if batch == previous {
                return Err(SyncError::FetchLoop(SAME_BATCH_MESSAGE.to_string()));
            }
            (self.process)(&batch)?;
            report += SyncReport::batch(batch.len());
            previous = batch;
            self.interrupt.sleep(self.delay)?;
        }

        Ok(Drained {
            report,
            exhausted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;

    fn scripted(batches: Vec<Vec<u32>>) -> impl FnMut() -> Result<Vec<u32>> {
        let mut queue: VecDeque<Vec<u32>> = batches.into();
        move || Ok(queue.pop_front().unwrap_or_default())
    }

    #[test]
    fn drains_until_empty_batch() {
        let processed = RefCell::new(Vec::new());
        let drained = DrainLoop::new(scripted(vec![vec![1, 2], vec![3]]), |b: &[u32]| {
            processed.borrow_mut().push(b.to_vec());
            Ok(())
        })
        .with_delay(Duration::ZERO)
        .run()
        .unwrap();

        assert_eq!(processed.into_inner(), vec![vec![1, 2], vec![3]]);
        assert_eq!(drained.report, SyncReport { batches: 2, records: 3 });
        assert!(drained.exhausted);
    }

    #[test]
    fn same_batch_twice_aborts_after_one_process() {
        let calls = Cell::new(0);
        let err = DrainLoop::new(scripted(vec![vec![7, 8], vec![7, 8], vec![9]]), |_: &[u32]| {
            calls.set(calls.get() + 1);
            Ok(())
        })
        .with_delay(Duration::ZERO)
        .run()
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        match err {
            SyncError::FetchLoop(msg) => assert!(msg.contains("same batch twice")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_consecutive_repeats_are_allowed() {
        let drained = DrainLoop::new(scripted(vec![vec![1], vec![2], vec![1]]), |_: &[u32]| Ok(()))
            .with_delay(Duration::ZERO)
            .run()
            .unwrap();
        assert_eq!(drained.report.batches, 3);
    }

    #[test]
    fn predicate_is_checked_before_every_fetch() {
        let fetches = Cell::new(0);
        let allowed = Cell::new(2u32);
        let drained = DrainLoop::new(
            || {
                fetches.set(fetches.get() + 1);
                Ok(vec![fetches.get()])
            },
            |_: &[u32]| Ok(()),
        )
        .allow_while(|| {
            let left = allowed.get();
            allowed.set(left.saturating_sub(1));
            left > 0
        })
        .with_delay(Duration::ZERO)
        .run()
        .unwrap();

        assert_eq!(fetches.get(), 2);
        assert_eq!(drained.report.batches, 2);
        assert!(!drained.exhausted);
    }

    #[test]
    fn process_error_stops_the_run() {
        let err = DrainLoop::new(scripted(vec![vec![1], vec![2]]), |_: &[u32]| {
            Err(SyncError::Transport(anyhow::anyhow!("catalog down")))
        })
        .with_delay(Duration::ZERO)
        .run()
        .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[test]
    fn triggered_interrupt_aborts_during_delay() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let processed = Cell::new(0);
        let err = DrainLoop::new(scripted(vec![vec![1], vec![2]]), |_: &[u32]| {
            processed.set(processed.get() + 1);
            Ok(())
        })
        .with_interrupt(&interrupt)
        .with_delay(Duration::from_secs(60))
        .run()
        .unwrap_err();

        assert!(matches!(err, SyncError::Interrupted));
        assert_eq!(processed.get(), 1);
    }

    #[test]
    fn interrupt_wakes_a_sleeping_thread() {
        let interrupt = Interrupt::new();
        let waiter = interrupt.clone();
        let handle = std::thread::spawn(move || waiter.sleep(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(50));
        interrupt.trigger();
        assert!(matches!(handle.join().unwrap(), Err(SyncError::Interrupted)));
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn untriggered_sleep_returns_ok() {
        assert!(Interrupt::new().sleep(Duration::from_millis(5)).is_ok());
    }
}
