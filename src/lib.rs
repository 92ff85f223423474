// ============================================================================
// Entity Locker Library
// ============================================================================
//
// Row-level locking for arbitrary in-memory entities: lock an ordered set of
// entities, run protected code against them, release on every exit path.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod lock;

// Re-export main types for convenience
pub use config::LockerConfig;
pub use crate::core::{EntityId, LockError, LockTarget, Result};
pub use lock::{
    EntityLocker, Interrupt, LockRegistry, Lockable, LockableEntity, LockerStatsSnapshot,
    ReentrantLock, ReentrantLockGuard,
};
