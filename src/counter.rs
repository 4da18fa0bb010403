//! Shared run state: counters and the cancellation flag.
//!
//! A batch run tracks four tallies across worker threads: `success`,
//! `failure`, `processed_sequence` and `active`. Each is a [`SafeCounter`].
//! The first three only ever grow during a run; `active` goes up when a job
//! starts and back down when it ends, via [`ActiveGuard`], so it reads zero
//! exactly when no job is executing.
//!
//! [`CancelFlag`] is the single stop signal. It is set from the controlling
//! side and only ever observed by jobs and by the coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Thread-safe counter. All operations are sequentially consistent, so a value
/// written by one worker is visible to every subsequent `get` on any thread.
#[derive(Debug, Default)]
pub struct SafeCounter {
    value: AtomicUsize,
}

impl SafeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the new value.
    pub fn increment(&self) -> usize {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Subtract one and return the new value. Saturates at zero.
    pub fn decrement(&self) -> usize {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn get(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset_to(&self, n: usize) {
        self.value.store(n, Ordering::SeqCst);
    }
}

/// Marks a job as executing for as long as the guard lives.
///
/// Dropping the guard decrements the counter on every exit path, unwinding
/// included.
#[must_use = "the job is only counted as active while the guard is alive"]
pub struct ActiveGuard<'a> {
    counter: &'a SafeCounter,
}

impl<'a> ActiveGuard<'a> {
    pub fn enter(counter: &'a SafeCounter) -> Self {
        counter.increment();
        Self { counter }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}

/// Cooperative, monotonic stop signal shared by a batch run.
///
/// Cloning shares the same flag. There is no way to clear it: a cancelled run
/// stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
