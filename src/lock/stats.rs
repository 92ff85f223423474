use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by an engine and its clones.
#[derive(Debug, Default)]
pub struct LockerStats {
    executions: AtomicU64,
    global_executions: AtomicU64,
    escalations: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
}

impl LockerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_global_execution(&self) {
        self.global_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockerStatsSnapshot {
        LockerStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            global_executions: self.global_executions.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LockerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockerStatsSnapshot {
    /// Calls that entered the entity-level path
    pub executions: u64,
    /// Calls that went through the global lock, directly or escalated
    pub global_executions: u64,
    pub escalations: u64,
    pub timeouts: u64,
    pub cancellations: u64,
}

impl fmt::Display for LockerStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Locker Stats: {} entity calls, {} global ({} escalated), {} timeouts, {} cancelled",
            self.executions,
            self.global_executions,
            self.escalations,
            self.timeouts,
            self.cancellations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_display() {
        let stats = LockerStats::new();
        stats.record_execution();
        stats.record_execution();
        stats.record_escalation();
        stats.record_global_execution();
        stats.record_timeout();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.executions, 2);
        assert_eq!(snapshot.escalations, 1);
        assert_eq!(snapshot.cancellations, 0);
        assert_eq!(
            snapshot.to_string(),
            "Locker Stats: 2 entity calls, 1 global (1 escalated), 1 timeouts, 0 cancelled"
        );
    }
}
