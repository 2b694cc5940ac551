//! Publish counters kept per publisher
//!
//! Atomic counters updated on the publish path, exported as a serializable
//! snapshot for whatever health or metrics surface the host application has.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe publish statistics
#[derive(Debug, Default)]
pub struct PublishStats {
    attempted: AtomicU64,
    acknowledged: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PublishStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishStatsSnapshot {
    pub attempted: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl PublishStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Broker accepted the message
    pub fn record_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    /// Broker answered with a failing reason code
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish never completed (transport error, timeout, lost link)
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PublishStatsSnapshot {
        PublishStatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_stats_are_zero() {
        assert_eq!(PublishStats::new().snapshot(), PublishStatsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = PublishStats::new();
        stats.record_attempt();
        stats.record_attempt();
        stats.record_attempt();
        stats.record_acknowledged();
        stats.record_rejected();
        stats.record_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempted, 3);
        assert_eq!(snapshot.acknowledged, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.failed, 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(PublishStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_attempt();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().attempted, 800);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = PublishStats::new();
        stats.record_attempt();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["attempted"], 1);
        assert_eq!(json["failed"], 0);
    }
}
