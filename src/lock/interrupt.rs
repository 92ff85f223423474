use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation handle for threads blocked on lock acquisition.
///
/// Threads cannot be interrupted from the outside, so a waiter that wants to
/// be cancellable passes an `Interrupt` to the engine and polls it while
/// waiting. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every waiter holding a clone of this handle to give up.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm the handle so it can be reused for another call.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        assert!(!interrupt.is_interrupted());

        remote.interrupt();
        assert!(interrupt.is_interrupted());

        interrupt.reset();
        assert!(!remote.is_interrupted());
    }
}
