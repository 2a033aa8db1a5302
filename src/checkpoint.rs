use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

const CLOSING: u32 = 1 << 31;

/// Reference count of in-flight checkpoint loops, with a high-bit `CLOSING`
/// flag: `snapshot` increments unless closing, the destructor sets the bit
/// and spins until the count drains to zero.
#[derive(Debug, Default)]
pub(crate) struct ClosingCounter(AtomicU32);

impl ClosingCounter {
    pub(crate) fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Increment unless `CLOSING` is set. Returns `false` if the ring is closing.
    pub(crate) fn enter(&self) -> bool {
        loop {
            let cur = self.0.load(Ordering::Relaxed);
            if cur & CLOSING != 0 {
                return false;
            }
            if self
                .0
                .compare_exchange_weak(cur, cur + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(crate) fn exit(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.0.load(Ordering::Relaxed) & CLOSING != 0
    }

    /// Called once, from `Drop`: mark closing, then spin until every
    /// in-flight checkpoint loop has called `exit`.
    pub(crate) fn close_and_wait(&self) {
        self.0.fetch_or(CLOSING, Ordering::AcqRel);
        while self.0.load(Ordering::Acquire) != CLOSING {
            thread::yield_now();
        }
    }
}

/// A snapshot of "how far the consumer needs to catch up", taken by
/// [`crate::Ring::snapshot`] and re-checked by [`crate::Ring::verif`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub(crate) diff: u64,
    pub(crate) actual_receiver: u64,
}

/// Result of [`crate::Ring::checkpoint_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// `verif` returned true: the consumer caught up.
    Drained {
        /// Number of `verif` attempts before success.
        iterations: u32,
    },
    /// The ring started closing, or the caller's kill flag was observed set,
    /// before the consumer caught up.
    Aborted {
        /// Number of `verif` attempts before giving up.
        iterations: u32,
    },
}
