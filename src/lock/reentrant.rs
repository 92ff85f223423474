// ============================================================================
// Reentrant Lock
// ============================================================================
//
// Timed, optionally interruptible reentrant mutual exclusion built on
// parking_lot's ReentrantMutex. Two ways to hold it:
//
// - RAII: `try_lock_for` / `wait_for` hand out a guard that unlocks one level
//   on drop. The engine only ever uses this form.
// - Raw: `acquire` / `release` pairs for callers that manage the lock by hand.
//   Raw holds are counted so that `release` can refuse to unlock a level it
//   does not own.
//
// ============================================================================

use super::Interrupt;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// How often an interruptible waiter re-checks its interrupt flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct ReentrantLock {
    inner: ReentrantMutex<()>,
    /// Levels taken through `acquire` whose guards were leaked. Only the
    /// owning thread touches it, so it always belongs to the current owner.
    raw_holds: AtomicUsize,
}

/// One level of ownership; released when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ReentrantLockGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// Result of a bounded wait.
pub enum WaitOutcome<'a> {
    Acquired(ReentrantLockGuard<'a>),
    TimedOut,
    Interrupted,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(()),
            raw_holds: AtomicUsize::new(0),
        }
    }

    pub fn try_lock(&self) -> Option<ReentrantLockGuard<'_>> {
        self.inner
            .try_lock()
            .map(|guard| ReentrantLockGuard { _guard: guard })
    }

    /// Block up to `timeout`. Succeeds at once if this thread already holds it.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<ReentrantLockGuard<'_>> {
        self.inner
            .try_lock_for(timeout)
            .map(|guard| ReentrantLockGuard { _guard: guard })
    }

    /// Bounded wait that also gives up when `interrupt` is raised.
    ///
    /// Without an interrupt handle this is a single `try_lock_for`. With one,
    /// the wait is split into slices of at most `poll_interval` and the flag
    /// is checked before each slice.
    pub fn wait_for(
        &self,
        timeout: Duration,
        interrupt: Option<&Interrupt>,
        poll_interval: Duration,
    ) -> WaitOutcome<'_> {
        let Some(interrupt) = interrupt else {
            return match self.try_lock_for(timeout) {
                Some(guard) => WaitOutcome::Acquired(guard),
                None => WaitOutcome::TimedOut,
            };
        };

        // None: the timeout is too large to represent, wait until interrupted.
        let deadline = Instant::now().checked_add(timeout);
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        loop {
            if interrupt.is_interrupted() {
                return WaitOutcome::Interrupted;
            }

            let slice = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(poll_interval),
                None => poll_interval,
            };

            if let Some(guard) = self.try_lock_for(slice) {
                return WaitOutcome::Acquired(guard);
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return WaitOutcome::TimedOut;
            }
        }
    }

    /// Raw acquisition: on success the calling thread keeps one level until a
    /// matching `release`.
    pub fn acquire(&self, timeout: Duration) -> bool {
        match self.inner.try_lock_for(timeout) {
            Some(guard) => {
                std::mem::forget(guard);
                self.raw_holds.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Release one level taken by `acquire` on this thread.
    ///
    /// Returns `false` and does nothing when the calling thread has no
    /// outstanding raw hold.
    pub fn release(&self) -> bool {
        if !self.inner.is_owned_by_current_thread() {
            return false;
        }
        if self.raw_holds.load(Ordering::Relaxed) == 0 {
            return false;
        }
        self.raw_holds.fetch_sub(1, Ordering::Relaxed);
        // SAFETY: the current thread owns the mutex and has at least one
        // guard that was forgotten in `acquire`; this unlocks that level.
        unsafe { self.inner.force_unlock() };
        true
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.inner.is_owned_by_current_thread()
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
