// ============================================================================
// Locking Module
// ============================================================================
//
// Row-level style locking for in-memory entities:
//
// - ReentrantLock: timed, interruptible reentrant primitive
// - Lockable / LockableEntity: an identity that owns its lock
// - LockRegistry: key -> shared entity lock, for callers without shared instances
// - EntityLocker: ordered acquisition, escalation and the global-lock path
//
// ============================================================================

pub mod engine;
pub mod entity;
pub mod interrupt;
pub mod registry;
mod reentrant;
mod stack;
pub mod stats;

pub use engine::EntityLocker;
pub use entity::{Lockable, LockableEntity};
pub use interrupt::Interrupt;
pub use reentrant::{DEFAULT_POLL_INTERVAL, ReentrantLock, ReentrantLockGuard, WaitOutcome};
pub use registry::LockRegistry;
pub use stats::{LockerStats, LockerStatsSnapshot};
