use super::LockableEntity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Key-addressed entity locks.
///
/// Callers that cannot share entity instances resolve keys here instead:
/// every equal key maps to the same lazily created handle, so exclusion is
/// by key rather than by object identity.
pub struct LockRegistry<K> {
    entries: Mutex<HashMap<K, Arc<LockableEntity<K>>>>,
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for `key`, created on first use.
    pub fn handle(&self, key: &K) -> Arc<LockableEntity<K>> {
        let mut entries = self.entries.lock();
        Self::entry(&mut entries, key)
    }

    /// Handles for `keys`, in the same order. Duplicate keys yield the same
    /// handle, which the engine then locks reentrantly.
    pub fn handles(&self, keys: &[K]) -> Vec<Arc<LockableEntity<K>>> {
        let mut entries = self.entries.lock();
        keys.iter().map(|key| Self::entry(&mut entries, key)).collect()
    }

    fn entry(
        entries: &mut HashMap<K, Arc<LockableEntity<K>>>,
        key: &K,
    ) -> Arc<LockableEntity<K>> {
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(LockableEntity::new(key.clone())))
            .clone()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop handles nobody outside the registry references. Returns how many
    /// were removed.
    pub fn purge_unused(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        // Handles are only cloned under this mutex, so a count of one cannot
        // grow while we look at it.
        entries.retain(|_, handle| Arc::strong_count(handle) > 1 || handle.is_locked());
        before - entries.len()
    }
}

impl<K> Default for LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for LockRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRegistry")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_keys_share_handle() {
        let registry = LockRegistry::new();
        let a = registry.handle(&"user:1".to_string());
        let b = registry.handle(&"user:1".to_string());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handles_preserve_order_and_duplicates() {
        let registry = LockRegistry::new();
        let handles = registry.handles(&[3, 1, 3]);
        assert_eq!(*handles[0].id(), 3);
        assert_eq!(*handles[1].id(), 1);
        assert!(Arc::ptr_eq(&handles[0], &handles[2]));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_purge_unused_keeps_referenced_handles() {
        let registry = LockRegistry::new();
        let kept = registry.handle(&1u64);
        drop(registry.handle(&2u64));

        assert_eq!(registry.purge_unused(), 1);
        assert!(registry.contains(&1));
        assert!(!registry.contains(&2));

        drop(kept);
        assert_eq!(registry.purge_unused(), 1);
        assert!(registry.is_empty());
    }
}
