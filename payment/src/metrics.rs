//! Metrics collection for the payment service.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Service metrics.
pub struct Metrics {
    /// Transactions committed, any kind.
    pub transactions_created: AtomicU64,
    /// Transactions refused by a precondition or rolled back.
    pub transactions_rejected: AtomicU64,
    /// Payouts committed.
    pub payouts_completed: AtomicU64,
    /// Payouts refused or rolled back.
    pub payouts_rejected: AtomicU64,
    /// Row stamps that failed verification.
    pub integrity_violations: AtomicU64,
    /// Events dispatched to a handler without error.
    pub events_handled: AtomicU64,
    /// Events that were malformed or whose handler failed.
    pub events_failed: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            transactions_created: AtomicU64::new(0),
            transactions_rejected: AtomicU64::new(0),
            payouts_completed: AtomicU64::new(0),
            payouts_rejected: AtomicU64::new(0),
            integrity_violations: AtomicU64::new(0),
            events_handled: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        }
    }

    /// Record a committed transaction.
    pub fn transaction_created(&self) {
        self.transactions_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected transaction.
    pub fn transaction_rejected(&self) {
        self.transactions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a payout.
    pub fn payout(&self, committed: bool) {
        if committed {
            self.payouts_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.payouts_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed stamp check.
    pub fn integrity_violation(&self) {
        self.integrity_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handled event.
    pub fn event_handled(&self) {
        self.events_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed event.
    pub fn event_failed(&self) {
        self.events_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_created: self.transactions_created.load(Ordering::Relaxed),
            transactions_rejected: self.transactions_rejected.load(Ordering::Relaxed),
            payouts_completed: self.payouts_completed.load(Ordering::Relaxed),
            payouts_rejected: self.payouts_rejected.load(Ordering::Relaxed),
            integrity_violations: self.integrity_violations.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_created: u64,
    pub transactions_rejected: u64,
    pub payouts_completed: u64,
    pub payouts_rejected: u64,
    pub integrity_violations: u64,
    pub events_handled: u64,
    pub events_failed: u64,
}
