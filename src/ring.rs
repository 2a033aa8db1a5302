use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;

use crate::backoff::WaitStrategy;
use crate::checkpoint::{Checkpoint, CheckpointOutcome, ClosingCounter};
use crate::error::ConstructError;
use crate::invariants::debug_assert_avail_bounded;
use crate::metrics::Metrics;
use crate::params::{Config, Params};
use crate::strategy::{Cas, Reservation, Side, Strategy};

/// A lock-free, block-oriented circular buffer shared between one or more
/// producer threads and one or more consumer threads.
///
/// `S` selects the reserve/release synchronization discipline at compile
/// time ([`crate::Cas`], [`crate::Xch`], [`crate::Mtx`], [`crate::Spl`]) and
/// monomorphizes to straight-line code with no dynamic dispatch. `'mem` is
/// the lifetime of the caller-owned backing buffer passed to [`Ring::init`]:
/// the ring borrows it exclusively for as long as the ring is alive, then
/// hands it back.
///
/// Invariant metadata, TX state, and RX state live in three separate
/// cache-line regions: the plain fields below plus the two [`CachePadded`]
/// halves. `base`/`blk_size`/`blk_shift`/`overflow` never change after
/// `init` and naturally avoid false sharing with the two halves that atomics
/// or locks mutate continuously.
pub struct Ring<'mem, S: Strategy = Cas> {
    base: *mut u8,
    blk_size: u64,
    blk_shift: u32,
    overflow: u64,
    blk_count: u64,
    block_mask: u64,
    tx: CachePadded<S::Side>,
    rx: CachePadded<S::Side>,
    closing: ClosingCounter,
    metrics: Metrics,
    metrics_enabled: bool,
    _mem: PhantomData<&'mem mut [u8]>,
}

// SAFETY: the only field that isn't auto-Send/Sync is `base`, a raw pointer
// into `mem`. Access to the bytes it points at is mediated entirely by the
// reserve/release protocol, and `S::Side` is itself required to be
// `Send + Sync` by the `Strategy` trait.
unsafe impl<S: Strategy> Send for Ring<'_, S> {}
unsafe impl<S: Strategy> Sync for Ring<'_, S> {}

impl<'mem, S: Strategy> Ring<'mem, S> {
    /// Attach `mem` to a freshly computed ring shape.
    ///
    /// # Errors
    /// Returns [`ConstructError::BufferTooSmall`] if `mem` is shorter than
    /// `params.size()`.
    pub fn init(params: Params, config: Config, mem: &'mem mut [u8]) -> Result<Self, ConstructError> {
        let required = params.size();
        if mem.len() < required {
            return Err(ConstructError::BufferTooSmall { actual: mem.len(), required });
        }

        let base = mem.as_mut_ptr();
        tracing::info!(
            blk_size = params.blk_size,
            blk_count = params.initial_tx_avail,
            size = required,
            "ring init"
        );

        Ok(Self {
            base,
            blk_size: params.blk_size,
            blk_shift: params.blk_shift,
            overflow: params.overflow,
            blk_count: params.initial_tx_avail,
            // blk_count is a power of two (total bytes and blk_size both
            // are, by construction in Params::compute), so count-1 is a
            // valid mask.
            block_mask: params.initial_tx_avail - 1,
            tx: CachePadded::new(S::new_side(params.initial_tx_avail)),
            rx: CachePadded::new(S::new_side(0)),
            closing: ClosingCounter::new(),
            metrics: Metrics::new(),
            metrics_enabled: config.enable_metrics,
            _mem: PhantomData,
        })
    }

    fn side_state(&self, side: Side) -> &S::Side {
        match side {
            Side::Tx => &self.tx,
            Side::Rx => &self.rx,
        }
    }

    /// Snapshot counters, handed out via [`crate::MetricsSnapshot`] when
    /// `Config.enable_metrics` was set at `init`.
    #[must_use]
    pub fn metrics(&self) -> crate::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The raw, monotonically-increasing `pos` counter for `side`. Mainly a
    /// diagnostic: ordinary callers only need the token `reserve` hands
    /// back, not this running total.
    #[must_use]
    pub fn pos(&self, side: Side) -> u64 {
        S::side_pos(self.side_state(side))
    }

    /// Number of blocks currently available to reserve from `side`.
    #[must_use]
    pub fn avail(&self, side: Side) -> u64 {
        S::side_avail(self.side_state(side))
    }

    /// Reserve up to `max_count` blocks on `side`. Never blocks, never
    /// yields, never sleeps; `cnt == 0` on the returned [`Reservation`]
    /// means failure, including the no-op case `max_count == 0`.
    pub fn reserve(&self, side: Side, max_count: u64) -> Reservation {
        let state = self.side_state(side);
        let reservation = S::reserve(state, max_count);
        debug_assert_avail_bounded!(S::side_avail(state), self.blk_count);
        if reservation.is_failure() && max_count != 0 && self.metrics_enabled {
            self.metrics.record_reserve_failure();
        }
        reservation
    }

    /// Release `cnt` blocks to `dst` under the single-releaser discipline.
    /// Precondition: only one thread releases on `dst` at a time.
    pub fn release_single(&self, dst: Side, cnt: u64) {
        let state = self.side_state(dst);
        S::release_single(state, cnt);
        debug_assert_avail_bounded!(S::side_avail(state), self.blk_count);
    }

    /// Release `cnt` blocks to `dst` under the multi-releaser discipline,
    /// ordered by `reservation_pos` (as returned by [`Ring::reserve`] on the
    /// side that produced this reservation). Returns `0` on a retryable
    /// ordering conflict; the caller loops with a [`WaitStrategy`].
    pub fn release_multi(&self, dst: Side, cnt: u64, reservation_pos: u64) -> u64 {
        let state = self.side_state(dst);
        let granted = S::release_multi(state, cnt, reservation_pos);
        debug_assert_avail_bounded!(S::side_avail(state), self.blk_count);
        if granted == 0 && self.metrics_enabled {
            self.metrics.record_release_multi_retry();
        }
        granted
    }

    /// Unconditional release, ignoring the `release_pos` ordering gate
    /// entirely. Dangerous under contention unless the caller can prove
    /// single-threaded access to `dst`. Off by default; enable the `scary`
    /// crate feature to use it.
    #[cfg(feature = "scary")]
    pub fn release_scary(&self, dst: Side, cnt: u64) {
        tracing::warn!(cnt, "release_scary: ignoring release_pos ordering gate");
        S::release_scary(self.side_state(dst), cnt);
    }

    /// Translate a reservation token plus a block index into a raw address.
    ///
    /// # Safety
    /// The caller must hold a live reservation covering block `pos + i`:
    /// the range `[pos, pos + cnt)` from a still-unreleased [`Reservation`].
    /// This performs no bounds check — the reservation protocol is the
    /// bounds check.
    #[must_use]
    pub unsafe fn access(&self, pos: u64, i: u64) -> *mut u8 {
        let byte_offset = (pos.wrapping_add(i) << self.blk_shift) & self.overflow;
        self.base.add(byte_offset as usize)
    }

    /// Like [`Ring::access`] but returns a `blk_size`-byte mutable slice.
    ///
    /// # Safety
    /// Same contract as [`Ring::access`].
    #[must_use]
    pub unsafe fn access_mut(&self, pos: u64, i: u64) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.access(pos, i), self.blk_size as usize)
    }

    /// Like [`Ring::access`] but returns a `blk_size`-byte shared slice.
    ///
    /// # Safety
    /// Same contract as [`Ring::access`].
    #[must_use]
    pub unsafe fn access_ref(&self, pos: u64, i: u64) -> &[u8] {
        std::slice::from_raw_parts(self.access(pos, i), self.blk_size as usize)
    }

    // Both actual_* quantities are masked modulo blk_count rather than left
    // as raw monotonic counters: without the mask, `diff` in `snapshot` can
    // be the wrapped representation of a huge negative number, which makes
    // the `>=` comparison in `verif` meaningless. Masking folds both
    // quantities into `[0, blk_count)`, where the wrapping comparisons
    // behave like the TCP-sequence-number trick they're meant to be.
    fn actual_sender(&self) -> u64 {
        // Read RX.pos before RX.avail: a stale-low read of either yields a
        // stale-low actual_sender, never a stale-high one, which is what
        // would cause verif to wait past the point the data really arrived.
        let pos = S::side_pos(&self.rx);
        let avail = S::side_avail(&self.rx);
        pos.wrapping_add(avail) & self.block_mask
    }

    fn actual_receiver(&self) -> u64 {
        // Mirror order: TX.avail before TX.pos.
        let avail = S::side_avail(&self.tx);
        let pos = S::side_pos(&self.tx);
        pos.wrapping_add(avail) & self.block_mask
    }

    fn is_drained(&self) -> bool {
        S::side_pos(&self.tx) == S::side_pos(&self.rx)
    }

    /// Take a checkpoint of "how far the consumer needs to catch up".
    /// Returns `None` if the ring is closing.
    #[must_use]
    pub fn snapshot(&self) -> Option<Checkpoint> {
        if !self.closing.enter() {
            return None;
        }
        let actual_sender = self.actual_sender();
        let actual_receiver = self.actual_receiver();
        let diff = actual_sender.wrapping_sub(actual_receiver) & self.block_mask;
        Some(Checkpoint { diff, actual_receiver })
    }

    /// Re-check a [`Checkpoint`] taken by [`Ring::snapshot`]. True once the
    /// consumer has caught up to (or the ring is observably empty past) the
    /// point the snapshot was taken.
    #[must_use]
    pub fn verif(&self, checkpoint: &Checkpoint) -> bool {
        let new_actual_receiver = self.actual_receiver();
        (new_actual_receiver.wrapping_sub(checkpoint.actual_receiver) & self.block_mask)
            >= checkpoint.diff
            || self.is_drained()
    }

    /// Release the in-flight-checkpoint slot taken by [`Ring::snapshot`].
    /// Called automatically by [`Ring::checkpoint_loop`]; callers driving
    /// their own `snapshot`/`verif` loop instead of `checkpoint_loop` must
    /// call this exactly once per successful `snapshot`, or the ring's
    /// destructor will spin forever waiting for it to drain.
    pub fn end_checkpoint(&self) {
        self.closing.exit();
    }

    /// Repeatedly call [`Ring::verif`], waiting between attempts with
    /// `wait`, until it returns true, the ring starts closing, or
    /// `kill.load()` observes `true` (checked once per iteration).
    pub fn checkpoint_loop(&self, wait: WaitStrategy, kill: &AtomicBool) -> CheckpointOutcome {
        let Some(checkpoint) = self.snapshot() else {
            return CheckpointOutcome::Aborted { iterations: 0 };
        };
        let mut iterations: u32 = 0;
        let mut attempt: u32 = 0;
        loop {
            if self.verif(&checkpoint) {
                self.end_checkpoint();
                return CheckpointOutcome::Drained { iterations };
            }
            if self.closing.is_closing() || kill.load(Ordering::Relaxed) {
                self.end_checkpoint();
                tracing::debug!(iterations, "checkpoint loop aborted: closing or killed");
                return CheckpointOutcome::Aborted { iterations };
            }
            let metrics = self.metrics_enabled.then_some(&self.metrics);
            wait.wait(&mut attempt, metrics);
            iterations = iterations.saturating_add(1);
        }
    }
}

impl<S: Strategy> Drop for Ring<'_, S> {
    fn drop(&mut self) {
        tracing::info!("ring deinit");
        self.closing.close_and_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Cas, Mtx, Spl, Xch};

    fn make_ring<S: Strategy>(mem: &mut [u8], blk_size: u64, blk_count: u64) -> Ring<'_, S> {
        let params = Params::compute(blk_size, blk_count).unwrap();
        Ring::init(params, Config::default(), mem).unwrap()
    }

    #[test]
    fn reserve_release_single_roundtrip() {
        let mut mem = vec![0u8; 1024];
        let ring: Ring<'_, Cas> = make_ring(&mut mem, 64, 16);

        let r = ring.reserve(Side::Tx, 4);
        assert_eq!(r.cnt, 4);
        unsafe {
            for i in 0..4 {
                ring.access_mut(r.pos, i)[0] = i as u8;
            }
        }
        ring.release_single(Side::Rx, 4);

        let r2 = ring.reserve(Side::Rx, 4);
        assert_eq!(r2.cnt, 4);
        unsafe {
            for i in 0..4 {
                assert_eq!(ring.access_ref(r2.pos, i)[0], i as u8);
            }
        }
        ring.release_single(Side::Tx, 4);
    }

    #[test]
    fn ping_pong_all_strategies() {
        fn run<S: Strategy>() {
            let mut mem = vec![0u8; 32];
            let ring: Ring<'_, S> = make_ring(&mut mem, 8, 4);
            for i in 0u64..1000 {
                let r = ring.reserve(Side::Tx, 1);
                assert_eq!(r.cnt, 1);
                unsafe {
                    ring.access_mut(r.pos, 0)[0..8].copy_from_slice(&i.to_ne_bytes());
                }
                ring.release_single(Side::Rx, 1);

                let r2 = ring.reserve(Side::Rx, 1);
                assert_eq!(r2.cnt, 1);
                let v = unsafe {
                    u64::from_ne_bytes(ring.access_ref(r2.pos, 0)[0..8].try_into().unwrap())
                };
                assert_eq!(v, i);
                ring.release_single(Side::Tx, 1);
            }
        }
        run::<Cas>();
        run::<Xch>();
        run::<Mtx>();
        run::<Spl>();
    }

    #[test]
    fn buffer_too_small_errors() {
        let mut mem = vec![0u8; 4];
        let params = Params::compute(64, 16).unwrap();
        let err = Ring::<Cas>::init(params, Config::default(), &mut mem).unwrap_err();
        assert!(matches!(err, ConstructError::BufferTooSmall { .. }));
    }

    #[test]
    fn checkpoint_drains() {
        let mut mem = vec![0u8; 1024];
        let ring: Ring<'_, Cas> = make_ring(&mut mem, 64, 16);

        for i in 0u64..8 {
            let r = ring.reserve(Side::Tx, 1);
            unsafe {
                ring.access_mut(r.pos, 0)[0] = i as u8;
            }
            ring.release_single(Side::Rx, 1);
        }
        let checkpoint = ring.snapshot().expect("ring not closing");
        assert!(!ring.verif(&checkpoint));

        for _ in 0u64..8 {
            let r = ring.reserve(Side::Rx, 1);
            ring.release_single(Side::Tx, 1);
            let _ = r;
        }
        assert!(ring.verif(&checkpoint));
        ring.end_checkpoint();
    }

    #[test]
    fn checkpoint_loop_aborts_on_kill_flag() {
        let mut mem = vec![0u8; 32];
        let ring: Ring<'_, Cas> = make_ring(&mut mem, 8, 4);
        // Produce one block and leave it unconsumed: diff > 0, so verif()
        // fails on the first check and the loop actually reaches the kill
        // check instead of succeeding trivially on an empty ring.
        let r = ring.reserve(Side::Tx, 1);
        unsafe {
            ring.access_mut(r.pos, 0)[0] = 1;
        }
        ring.release_single(Side::Rx, 1);

        let kill = AtomicBool::new(true);
        let outcome = ring.checkpoint_loop(WaitStrategy::Spin, &kill);
        assert!(matches!(outcome, CheckpointOutcome::Aborted { .. }));
    }
}
