use std::hint;
use std::thread;
use std::time::Duration;

use crate::metrics::Metrics;

/// Caller-side policy for what to do when `reserve` or `release_multi`
/// returns failure. The ring itself never waits: `reserve` and
/// `release_multi` always return immediately, so looping is left entirely
/// to whoever calls them.
///
/// Distinguishes a spin phase (`hint::spin_loop`) from a yield phase
/// (`thread::yield_now`), surfaced as explicit, caller-selected variants
/// rather than a single self-escalating struct, so each strategy can be
/// picked independently instead of always auto-escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Busy-loop on a CPU pause hint. Lowest latency, burns a core.
    Spin,
    /// Hand the CPU back to the scheduler every attempt.
    Yield,
    /// Sleep roughly one microsecond between attempts.
    Sleep,
    /// Spin for `spin_limit` attempts, then fall back to yielding.
    Bounded {
        /// Number of spin attempts before switching to yield. Default 8.
        spin_limit: u32,
    },
}

impl WaitStrategy {
    /// The default bound used by [`WaitStrategy::bounded`]: spin up to N
    /// failures then yield.
    pub const DEFAULT_SPIN_LIMIT: u32 = 8;

    /// `Bounded` with the default spin limit of 8.
    #[must_use]
    pub fn bounded() -> Self {
        Self::Bounded { spin_limit: Self::DEFAULT_SPIN_LIMIT }
    }

    /// Perform one wait step. `attempt` is the caller's running count of
    /// consecutive failures on this call site; it is incremented in place
    /// so a loop can simply do `loop { ... ; strategy.wait(&mut attempt, ..) }`.
    pub fn wait(&self, attempt: &mut u32, metrics: Option<&Metrics>) {
        match self {
            Self::Spin => {
                hint::spin_loop();
                *attempt = attempt.saturating_add(1);
                if let Some(m) = metrics {
                    m.record_wait_spin();
                }
            }
            Self::Yield => {
                thread::yield_now();
                *attempt = attempt.saturating_add(1);
            }
            Self::Sleep => {
                thread::sleep(Duration::from_micros(1));
                *attempt = attempt.saturating_add(1);
            }
            Self::Bounded { spin_limit } => {
                if *attempt < *spin_limit {
                    hint::spin_loop();
                    if let Some(m) = metrics {
                        m.record_wait_spin();
                    }
                } else {
                    thread::yield_now();
                }
                *attempt = attempt.saturating_add(1);
            }
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::bounded()
    }
}
