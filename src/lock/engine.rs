// ============================================================================
// Entity Locker
// ============================================================================
//
// Row-level locking for in-memory entities.
//
// Entity path: lock `ids` one by one in the order given, run the protected
// code, release in reverse order. Once a call already holds more entity
// locks than the escalation threshold, the rest of the call is routed
// through the global lock instead.
//
// Global path: one lock per coordination domain; every call through it is
// serialized against every other, including escalated entity calls.
//
// Deadlock avoidance is timeout-only. The engine never reorders `ids` and
// does not detect wait cycles; callers that contend on overlapping sets must
// list entities in a consistent order.
//
// ============================================================================

use super::reentrant::WaitOutcome;
use super::stack::AcquisitionStack;
use super::stats::{LockerStats, LockerStatsSnapshot};
use super::{Interrupt, LockRegistry, Lockable, ReentrantLock};
use crate::config::LockerConfig;
use crate::core::types::millis;
use crate::core::{LockError, LockTarget, Result};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, event, info_span};

/// Locking engine
///
/// Clones share the global lock and the statistics, so a clone handed to
/// another thread coordinates with the original.
///
/// # Examples
///
/// ```
/// use entity_locker::{EntityLocker, LockableEntity};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let locker = EntityLocker::new();
/// let a = LockableEntity::new("account:1");
/// let b = LockableEntity::new("account:2");
///
/// let total = locker.execute(&[&a, &b], |ids| ids.len(), Duration::from_secs(1))?;
/// assert_eq!(total, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EntityLocker {
    global: Arc<ReentrantLock>,
    escalation_threshold: Option<usize>,
    default_timeout: Duration,
    poll_interval: Duration,
    stats: Arc<LockerStats>,
}

impl EntityLocker {
    /// Engine with escalation disabled
    pub fn new() -> Self {
        Self::with_config_unchecked(&LockerConfig::new())
    }

    /// Engine that escalates once a call holds more than `threshold` entity
    /// locks and still has entities left to lock.
    pub fn with_escalation_threshold(threshold: usize) -> Self {
        Self::with_config_unchecked(&LockerConfig::new().escalation_threshold(threshold))
    }

    pub fn from_config(config: &LockerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config_unchecked(config))
    }

    fn with_config_unchecked(config: &LockerConfig) -> Self {
        Self {
            global: Arc::new(ReentrantLock::new()),
            escalation_threshold: config.escalation_threshold,
            default_timeout: config.default_timeout,
            poll_interval: config.poll_interval,
            stats: Arc::new(LockerStats::new()),
        }
    }

    /// New engine in the same global-lock domain as `self`, with its own
    /// threshold and statistics.
    pub fn sharing_global_lock(&self, escalation_threshold: Option<usize>) -> Self {
        Self {
            global: Arc::clone(&self.global),
            escalation_threshold,
            default_timeout: self.default_timeout,
            poll_interval: self.poll_interval,
            stats: Arc::new(LockerStats::new()),
        }
    }

    pub fn escalation_threshold(&self) -> Option<usize> {
        self.escalation_threshold
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn stats(&self) -> LockerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether some thread currently holds the global lock
    pub fn is_global_locked(&self) -> bool {
        self.global.is_locked()
    }

    /// Run `protected` once every entity in `ids` is locked.
    ///
    /// Each acquisition waits up to `timeout`. On failure every lock taken so
    /// far is released before the error is returned. Whatever `protected`
    /// returns (including its own `Result`) is passed through untouched.
    pub fn execute<T, R, F>(&self, ids: &[T], protected: F, timeout: Duration) -> Result<R>
    where
        T: Lockable,
        F: FnOnce(&[T]) -> R,
    {
        self.run_entity_path(ids, protected, timeout, None)
    }

    /// Like [`execute`](Self::execute), giving up with
    /// [`LockError::Cancelled`] once `interrupt` is raised.
    pub fn execute_interruptible<T, R, F>(
        &self,
        ids: &[T],
        protected: F,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<R>
    where
        T: Lockable,
        F: FnOnce(&[T]) -> R,
    {
        self.run_entity_path(ids, protected, timeout, Some(interrupt))
    }

    /// [`execute`](Self::execute) with the configured default timeout
    pub fn execute_default<T, R, F>(&self, ids: &[T], protected: F) -> Result<R>
    where
        T: Lockable,
        F: FnOnce(&[T]) -> R,
    {
        self.run_entity_path(ids, protected, self.default_timeout, None)
    }

    /// Lock by key through `registry`; equal keys share one lock.
    pub fn execute_keys<K, R, F>(
        &self,
        registry: &LockRegistry<K>,
        keys: &[K],
        protected: F,
        timeout: Duration,
    ) -> Result<R>
    where
        K: Eq + Hash + Clone + fmt::Debug,
        F: FnOnce(&[K]) -> R,
    {
        let handles = registry.handles(keys);
        self.run_entity_path(&handles, |_| protected(keys), timeout, None)
    }

    /// Run `protected` under the global lock, serialized against every other
    /// global or escalated call in this domain.
    pub fn execute_with_global_lock<T, R, F>(
        &self,
        ids: &[T],
        protected: F,
        timeout: Duration,
    ) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        let span = info_span!("locker.global", entities = ids.len());
        let _enter = span.enter();
        self.run_global_path(ids, protected, timeout, None)
    }

    pub fn execute_with_global_lock_interruptible<T, R, F>(
        &self,
        ids: &[T],
        protected: F,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        let span = info_span!("locker.global", entities = ids.len());
        let _enter = span.enter();
        self.run_global_path(ids, protected, timeout, Some(interrupt))
    }

    fn should_escalate(&self, depth: usize) -> bool {
        self.escalation_threshold
            .is_some_and(|threshold| depth > threshold)
    }

    fn run_entity_path<T, R, F>(
        &self,
        ids: &[T],
        protected: F,
        timeout: Duration,
        interrupt: Option<&Interrupt>,
    ) -> Result<R>
    where
        T: Lockable,
        F: FnOnce(&[T]) -> R,
    {
        let span = info_span!(
            "locker.execute",
            entities = ids.len(),
            timeout_ms = millis(timeout)
        );
        let _enter = span.enter();
        self.stats.record_execution();

        let mut held = AcquisitionStack::with_capacity(ids.len());

        for (depth, entity) in ids.iter().enumerate() {
            if self.should_escalate(depth) {
                self.stats.record_escalation();
                event!(
                    Level::DEBUG,
                    depth,
                    threshold = self.escalation_threshold,
                    "escalating to global lock"
                );
                // The entity locks taken so far stay held while waiting for
                // the global lock and are released only after it.
                let result = self.run_global_path(ids, protected, timeout, interrupt);
                drop(held);
                return result;
            }

            match entity
                .entity_lock()
                .wait_for(timeout, interrupt, self.poll_interval)
            {
                WaitOutcome::Acquired(guard) => held.push(guard),
                WaitOutcome::TimedOut => {
                    return Err(self.timed_out(entity.lock_target(), timeout));
                }
                WaitOutcome::Interrupted => {
                    return Err(self.cancelled(entity.lock_target()));
                }
            }
        }

        event!(Level::DEBUG, held = held.depth(), "entity locks acquired");
        let result = protected(ids);
        drop(held);
        Ok(result)
    }

    fn run_global_path<T, R, F>(
        &self,
        ids: &[T],
        protected: F,
        timeout: Duration,
        interrupt: Option<&Interrupt>,
    ) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        self.stats.record_global_execution();

        match self.global.wait_for(timeout, interrupt, self.poll_interval) {
            WaitOutcome::Acquired(guard) => {
                event!(Level::TRACE, "global lock acquired");
                let result = protected(ids);
                drop(guard);
                event!(Level::TRACE, "global lock released");
                Ok(result)
            }
            WaitOutcome::TimedOut => Err(self.timed_out(LockTarget::Global, timeout)),
            WaitOutcome::Interrupted => Err(self.cancelled(LockTarget::Global)),
        }
    }

    fn timed_out(&self, target: LockTarget, timeout: Duration) -> LockError {
        self.stats.record_timeout();
        event!(
            Level::WARN,
            lock = %target,
            timeout_ms = millis(timeout),
            "lock acquisition timed out"
        );
        LockError::timeout(target, timeout)
    }

    fn cancelled(&self, target: LockTarget) -> LockError {
        self.stats.record_cancellation();
        event!(Level::WARN, lock = %target, "lock acquisition interrupted");
        LockError::Cancelled { target }
    }
}

impl Default for EntityLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityLocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLocker")
            .field("escalation_threshold", &self.escalation_threshold)
            .field("default_timeout", &self.default_timeout)
            .field("global_locked", &self.global.is_locked())
            .finish()
    }
}
