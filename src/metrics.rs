use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters, gated behind `Config.enable_metrics`.
///
/// A `Metrics`/`MetricsSnapshot` split: live atomic counters plus a plain
/// point-in-time copy for callers who just want to read the numbers.
/// Counters are atomic rather than plain integers since every one of them
/// can be bumped from any producer or consumer thread concurrently.
#[derive(Debug, Default)]
pub struct Metrics {
    reserve_failures: AtomicU64,
    release_multi_retries: AtomicU64,
    wait_spins: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_reserve_failure(&self) {
        self.reserve_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release_multi_retry(&self) {
        self.release_multi_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait_spin(&self) {
        self.wait_spins.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time, non-atomic snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reserve_failures: self.reserve_failures.load(Ordering::Relaxed),
            release_multi_retries: self.release_multi_retries.load(Ordering::Relaxed),
            wait_spins: self.wait_spins.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`], suitable for logging or assertions in
/// tests without holding a reference to the live counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of `reserve` calls that returned `cnt == 0`.
    pub reserve_failures: u64,
    /// Number of `release_multi` calls that lost the ordering race and returned 0.
    pub release_multi_retries: u64,
    /// Number of spin iterations recorded by a [`crate::WaitStrategy`].
    pub wait_spins: u64,
}
