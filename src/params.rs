use crate::error::ConstructError;

/// Computed shape of a ring: promoted block size, promoted buffer size, and
/// the derived shift/mask pair that make addressing branch-free.
///
/// The requested block size and the requested total size are each promoted
/// independently to the next power of two, so that wrap-around at
/// `Ring::access` is a single `& overflow` mask rather than a modulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub(crate) blk_size: u64,
    pub(crate) blk_shift: u32,
    pub(crate) overflow: u64,
    pub(crate) initial_tx_avail: u64,
}

impl Params {
    /// Promote `blk_size_req` and `blk_size_req * blk_count_req` to powers of
    /// two and derive the ring's addressing constants.
    ///
    /// # Errors
    /// Returns [`ConstructError`] if `blk_size_req` is zero or either
    /// promotion overflows `u64`.
    pub fn compute(blk_size_req: u64, blk_count_req: u64) -> Result<Self, ConstructError> {
        if blk_size_req == 0 {
            return Err(ConstructError::ZeroBlockSize);
        }
        let blk_size = next_pow2(blk_size_req)
            .ok_or(ConstructError::BlockSizeOverflow { requested: blk_size_req })?;

        let total_req = blk_size
            .checked_mul(blk_count_req.max(1))
            .ok_or(ConstructError::TotalSizeOverflow { blk_size, blk_count: blk_count_req })?;

        let total = next_pow2(total_req)
            .ok_or(ConstructError::BufferSizeOverflow { requested: total_req })?;

        let blk_shift = blk_size.trailing_zeros();
        let overflow = total - 1;
        let initial_tx_avail = total / blk_size;

        tracing::debug!(
            blk_size_req,
            blk_count_req,
            blk_size,
            total,
            blk_shift,
            initial_tx_avail,
            "computed ring params"
        );

        Ok(Self { blk_size, blk_shift, overflow, initial_tx_avail })
    }

    /// Total bytes the caller must allocate and pass to [`crate::Ring::init`].
    #[must_use]
    pub fn size(&self) -> usize {
        (self.overflow + 1) as usize
    }

    /// The promoted, power-of-two block size.
    #[must_use]
    pub fn blk_size(&self) -> u64 {
        self.blk_size
    }

    /// The promoted block count (`size() / blk_size()`).
    #[must_use]
    pub fn blk_count(&self) -> u64 {
        self.initial_tx_avail
    }
}

fn next_pow2(n: u64) -> Option<u64> {
    if n <= 1 {
        return Some(1);
    }
    let shift = 64 - (n - 1).leading_zeros();
    if shift >= 64 {
        return None;
    }
    Some(1u64 << shift)
}

/// Runtime toggles that don't affect sizing or the reserve/release protocol.
///
/// A plain `Copy` struct with a `Default` impl, kept deliberately small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Count reserve failures, `release_multi` retries, and wait-strategy
    /// spins into an atomics-based [`crate::Metrics`]. Off by default: the
    /// counters are relaxed atomics on the hot path, so this is not free.
    pub enable_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { enable_metrics: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_block_size_and_count() {
        // params(42, 10) => blk_size=64, blk_count=16, size=1024.
        let p = Params::compute(42, 10).unwrap();
        assert_eq!(p.blk_size(), 64);
        assert_eq!(p.blk_count(), 16);
        assert_eq!(p.size(), 1024);
    }

    #[test]
    fn already_pow2_is_unchanged() {
        let p = Params::compute(64, 16).unwrap();
        assert_eq!(p.blk_size(), 64);
        assert_eq!(p.size(), 1024);
    }

    #[test]
    fn zero_block_size_errors() {
        assert_eq!(Params::compute(0, 10), Err(ConstructError::ZeroBlockSize));
    }

    #[test]
    fn overflowing_block_size_errors() {
        assert!(matches!(
            Params::compute(1 << 63, 3),
            Err(ConstructError::BlockSizeOverflow { .. })
        ));
    }
}
