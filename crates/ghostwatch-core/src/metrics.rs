//! Guard counters.
//!
//! [`Counter`] is a relaxed atomic; [`GuardMetrics`] groups the counters the
//! runtime, executor, and reaper bump, and [`MetricsSnapshot`] is the plain
//! serializable view handed to callers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A monotonically increasing counter backed by [`AtomicU64`].
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.get()).finish()
    }
}

/// Shared counters for one guard instance.
#[derive(Debug, Default)]
pub struct GuardMetrics {
    pub admitted: Counter,
    pub rate_limited: Counter,
    pub archived: Counter,
    pub media_captured: Counter,
    pub media_failures: Counter,
    pub notifications_sent: Counter,
    pub self_deletions: Counter,
    pub revocation_misses: Counter,
    pub files_reaped: Counter,
    pub archive_expired: Counter,
}

impl GuardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted.get(),
            rate_limited: self.rate_limited.get(),
            archived: self.archived.get(),
            media_captured: self.media_captured.get(),
            media_failures: self.media_failures.get(),
            notifications_sent: self.notifications_sent.get(),
            self_deletions: self.self_deletions.get(),
            revocation_misses: self.revocation_misses.get(),
            files_reaped: self.files_reaped.get(),
            archive_expired: self.archive_expired.get(),
        }
    }
}

/// Point-in-time copy of [`GuardMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub rate_limited: u64,
    pub archived: u64,
    pub media_captured: u64,
    pub media_failures: u64,
    pub notifications_sent: u64,
    pub self_deletions: u64,
    pub revocation_misses: u64,
    pub files_reaped: u64,
    pub archive_expired: u64,
}
