use super::ReentrantLockGuard;
use tracing::{Level, event};

/// Entity locks held by one `execute` call, in acquisition order.
///
/// Dropping the stack releases them last-in first-out, which also happens
/// while unwinding from a panic in protected code.
pub(crate) struct AcquisitionStack<'a> {
    held: Vec<ReentrantLockGuard<'a>>,
}

impl<'a> AcquisitionStack<'a> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            held: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, guard: ReentrantLockGuard<'a>) {
        self.held.push(guard);
        event!(Level::TRACE, depth = self.held.len(), "entity lock acquired");
    }

    pub(crate) fn depth(&self) -> usize {
        self.held.len()
    }
}

impl Drop for AcquisitionStack<'_> {
    fn drop(&mut self) {
        // Vec drops front to back; pop to get reverse acquisition order.
        while let Some(guard) = self.held.pop() {
            drop(guard);
            event!(Level::TRACE, depth = self.held.len(), "entity lock released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::ReentrantLock;

    #[test]
    fn test_drop_releases_everything() {
        let first = ReentrantLock::new();
        let second = ReentrantLock::new();

        {
            let mut stack = AcquisitionStack::with_capacity(2);
            stack.push(first.try_lock().unwrap());
            stack.push(second.try_lock().unwrap());
            stack.push(first.try_lock().unwrap());
            assert_eq!(stack.depth(), 3);
            assert!(first.is_locked() && second.is_locked());
        }

        assert!(!first.is_locked());
        assert!(!second.is_locked());
    }
}
