use super::ReentrantLock;
use crate::core::{LockError, LockTarget, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Anything that carries its own reentrant lock.
///
/// The lock is part of the value: two instances whose identities compare
/// equal still have independent locks. Share one instance (for example
/// through `Arc`) between call sites that must exclude each other, or go
/// through a [`LockRegistry`](super::LockRegistry) to lock by key.
///
/// Domain types that need to carry extra data implement this by embedding a
/// [`ReentrantLock`].
pub trait Lockable {
    type Id: fmt::Debug + ?Sized;

    fn identity(&self) -> &Self::Id;

    fn entity_lock(&self) -> &ReentrantLock;

    /// Take the entity lock, blocking up to `timeout`. Reentrant.
    fn acquire(&self, timeout: Duration) -> bool {
        self.entity_lock().acquire(timeout)
    }

    /// Release one level taken by [`Lockable::acquire`] on this thread.
    fn release(&self) -> Result<()> {
        if self.entity_lock().release() {
            Ok(())
        } else {
            Err(LockError::NotOwner(self.lock_target().to_string()))
        }
    }

    fn lock_target(&self) -> LockTarget {
        LockTarget::entity(self.identity())
    }
}

impl<T: Lockable + ?Sized> Lockable for &T {
    type Id = T::Id;

    fn identity(&self) -> &Self::Id {
        (**self).identity()
    }

    fn entity_lock(&self) -> &ReentrantLock {
        (**self).entity_lock()
    }
}

impl<T: Lockable + ?Sized> Lockable for Arc<T> {
    type Id = T::Id;

    fn identity(&self) -> &Self::Id {
        (**self).identity()
    }

    fn entity_lock(&self) -> &ReentrantLock {
        (**self).entity_lock()
    }
}

impl<T: Lockable + ?Sized> Lockable for Box<T> {
    type Id = T::Id;

    fn identity(&self) -> &Self::Id {
        (**self).identity()
    }

    fn entity_lock(&self) -> &ReentrantLock {
        (**self).entity_lock()
    }
}

/// An identity paired with the lock that guards it.
pub struct LockableEntity<K> {
    identity: K,
    lock: ReentrantLock,
}

impl<K> LockableEntity<K> {
    pub fn new(identity: K) -> Self {
        Self {
            identity,
            lock: ReentrantLock::new(),
        }
    }

    pub fn id(&self) -> &K {
        &self.identity
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl<K: fmt::Debug> Lockable for LockableEntity<K> {
    type Id = K;

    fn identity(&self) -> &K {
        &self.identity
    }

    fn entity_lock(&self) -> &ReentrantLock {
        &self.lock
    }
}

impl<K: fmt::Debug> fmt::Debug for LockableEntity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockableEntity")
            .field("identity", &self.identity)
            .field("locked", &self.lock.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Account {
        number: u32,
        #[allow(dead_code)]
        owner: String,
        lock: ReentrantLock,
    }

    impl Lockable for Account {
        type Id = u32;

        fn identity(&self) -> &u32 {
            &self.number
        }

        fn entity_lock(&self) -> &ReentrantLock {
            &self.lock
        }
    }

    #[test]
    fn test_acquire_is_reentrant() {
        let entity = LockableEntity::new(1);
        assert!(entity.acquire(Duration::ZERO));
        assert!(entity.acquire(Duration::ZERO));
        entity.release().unwrap();
        entity.release().unwrap();
        assert!(!entity.is_locked());
    }

    #[test]
    fn test_release_without_acquire_fails() {
        let entity = LockableEntity::new("orders:42");
        let err = entity.release().unwrap_err();
        assert_eq!(
            err,
            LockError::NotOwner("entity \"orders:42\"".to_string())
        );
    }

    #[test]
    fn test_equal_identities_do_not_share_lock() {
        let first = Arc::new(LockableEntity::new(5));
        let second = Arc::new(LockableEntity::new(5));
        assert!(first.acquire(Duration::ZERO));

        let other = Arc::clone(&second);
        let acquired = thread::spawn(move || {
            let ok = other.acquire(Duration::ZERO);
            if ok {
                other.release().unwrap();
            }
            ok
        })
        .join()
        .unwrap();

        assert!(acquired);
        first.release().unwrap();
    }

    #[test]
    fn test_custom_lockable_through_arc() {
        let account = Arc::new(Account {
            number: 77,
            owner: "alice".into(),
            lock: ReentrantLock::new(),
        });

        assert_eq!(*account.identity(), 77);
        assert_eq!(account.lock_target(), LockTarget::Entity("77".into()));
        assert!(account.acquire(Duration::ZERO));
        account.release().unwrap();
    }
}
