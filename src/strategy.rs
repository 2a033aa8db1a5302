use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::invariants::{debug_assert_granted_bounded, debug_assert_not_mixed_release};

/// Which half of the ring an operation addresses. TX is producer-facing, RX
/// is consumer-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Producer-facing half.
    Tx,
    /// Consumer-facing half.
    Rx,
}

/// Result of [`crate::Ring::reserve`]. `cnt == 0` means failure; this is the
/// complete reservation descriptor, not an `Option` — `reserve(side, 0)`
/// must be expressible as a literal no-op call, which a `NonZeroU64`
/// parameter would rule out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reservation {
    /// Number of blocks actually granted; may be less than requested.
    pub cnt: u64,
    /// Token for the first granted block. Meaningless when `cnt == 0`.
    pub pos: u64,
}

impl Reservation {
    pub(crate) const FAILED: Self = Self { cnt: 0, pos: 0 };

    /// True when the reservation granted nothing.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.cnt == 0
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A reserve/release synchronization discipline, picked at compile time as a
/// type parameter on [`crate::Ring`] rather than through a trait object, so
/// the hot path monomorphizes instead of dispatching dynamically: the four
/// marker types below — [`Cas`], [`Xch`], [`Mtx`], [`Spl`] — are the only
/// implementors, and the trait is sealed so no fifth strategy can be added
/// outside this crate.
pub trait Strategy: sealed::Sealed + Sized {
    /// Per-side state this strategy needs: plain atomics for [`Cas`]/[`Xch`],
    /// a lock-guarded struct for [`Mtx`]/[`Spl`].
    type Side: Send + Sync;

    fn new_side(avail: u64) -> Self::Side;

    /// Non-authoritative read of `pos`, used only by the checkpoint.
    fn side_pos(side: &Self::Side) -> u64;
    /// Non-authoritative read of `avail`, used only by the checkpoint.
    fn side_avail(side: &Self::Side) -> u64;

    fn reserve(side: &Self::Side, max_count: u64) -> Reservation;
    fn release_single(side: &Self::Side, cnt: u64);
    fn release_multi(side: &Self::Side, cnt: u64, reservation_pos: u64) -> u64;
    /// Unconditional release, ignoring `release_pos` entirely.
    fn release_scary(side: &Self::Side, cnt: u64);
}

// ---------------------------------------------------------------------
// CAS and XCH share the same state shape (three plain atomics); they only
// differ in how `reserve` claims blocks.
// ---------------------------------------------------------------------

/// Side state for [`Cas`] and [`Xch`].
pub struct AtomicSide {
    pos: AtomicU64,
    avail: AtomicU64,
    release_pos: AtomicU64,
    single_used: AtomicBool,
    multi_used: AtomicBool,
}

impl AtomicSide {
    fn new(avail: u64) -> Self {
        Self {
            pos: AtomicU64::new(0),
            avail: AtomicU64::new(avail),
            release_pos: AtomicU64::new(0),
            single_used: AtomicBool::new(false),
            multi_used: AtomicBool::new(false),
        }
    }
}

fn atomic_release_single(side: &AtomicSide, cnt: u64) {
    debug_assert_not_mixed_release!(side.multi_used.load(Ordering::Relaxed));
    side.single_used.store(true, Ordering::Relaxed);
    side.avail.fetch_add(cnt, Ordering::Release);
}

fn atomic_release_multi(side: &AtomicSide, cnt: u64, reservation_pos: u64) -> u64 {
    debug_assert_not_mixed_release!(side.single_used.load(Ordering::Relaxed));
    side.multi_used.store(true, Ordering::Relaxed);
    match side.release_pos.compare_exchange(
        reservation_pos,
        reservation_pos.wrapping_add(cnt),
        Ordering::Relaxed,
        Ordering::Relaxed,
    ) {
        Ok(_) => {
            side.avail.fetch_add(cnt, Ordering::Release);
            cnt
        }
        Err(_) => 0,
    }
}

fn atomic_release_scary(side: &AtomicSide, cnt: u64) {
    side.avail.fetch_add(cnt, Ordering::Release);
}

/// Compare-and-swap reserve strategy.
pub struct Cas;
impl sealed::Sealed for Cas {}
impl Strategy for Cas {
    type Side = AtomicSide;

    fn new_side(avail: u64) -> Self::Side {
        AtomicSide::new(avail)
    }

    fn side_pos(side: &Self::Side) -> u64 {
        side.pos.load(Ordering::SeqCst)
    }

    fn side_avail(side: &Self::Side) -> u64 {
        side.avail.load(Ordering::SeqCst)
    }

    fn reserve(side: &Self::Side, max_count: u64) -> Reservation {
        if max_count == 0 {
            return Reservation::FAILED;
        }
        let mut avail = side.avail.load(Ordering::Relaxed);
        loop {
            if avail == 0 {
                return Reservation::FAILED;
            }
            let granted = avail.min(max_count);
            match side.avail.compare_exchange_weak(
                avail,
                avail - granted,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let pos = side.pos.fetch_add(granted, Ordering::Relaxed);
                    debug_assert_granted_bounded!(granted, max_count);
                    return Reservation { cnt: granted, pos };
                }
                Err(actual) => avail = actual,
            }
        }
    }

    fn release_single(side: &Self::Side, cnt: u64) {
        atomic_release_single(side, cnt);
    }

    fn release_multi(side: &Self::Side, cnt: u64, reservation_pos: u64) -> u64 {
        atomic_release_multi(side, cnt, reservation_pos)
    }

    fn release_scary(side: &Self::Side, cnt: u64) {
        atomic_release_scary(side, cnt);
    }
}

/// Exchange-based reserve strategy.
pub struct Xch;
impl sealed::Sealed for Xch {}
impl Strategy for Xch {
    type Side = AtomicSide;

    fn new_side(avail: u64) -> Self::Side {
        AtomicSide::new(avail)
    }

    fn side_pos(side: &Self::Side) -> u64 {
        side.pos.load(Ordering::SeqCst)
    }

    fn side_avail(side: &Self::Side) -> u64 {
        side.avail.load(Ordering::SeqCst)
    }

    fn reserve(side: &Self::Side, max_count: u64) -> Reservation {
        if max_count == 0 {
            return Reservation::FAILED;
        }
        let got = side.avail.swap(0, Ordering::Acquire);
        if got == 0 {
            return Reservation::FAILED;
        }
        let granted = if got > max_count {
            side.avail.fetch_add(got - max_count, Ordering::Relaxed);
            max_count
        } else {
            got
        };
        let pos = side.pos.fetch_add(granted, Ordering::Relaxed);
        debug_assert_granted_bounded!(granted, max_count);
        Reservation { cnt: granted, pos }
    }

    fn release_single(side: &Self::Side, cnt: u64) {
        atomic_release_single(side, cnt);
    }

    fn release_multi(side: &Self::Side, cnt: u64, reservation_pos: u64) -> u64 {
        atomic_release_multi(side, cnt, reservation_pos)
    }

    fn release_scary(side: &Self::Side, cnt: u64) {
        atomic_release_scary(side, cnt);
    }
}

// ---------------------------------------------------------------------
// MTX and SPL share the same state shape (a lock guarding plain fields);
// they only differ in the lock primitive: a blocking mutex for MTX, an
// atomic-flag test-and-set spinlock for SPL.
// ---------------------------------------------------------------------

struct LockedState {
    pos: u64,
    avail: u64,
    release_pos: u64,
    single_used: bool,
    multi_used: bool,
}

impl LockedState {
    fn new(avail: u64) -> Self {
        Self { pos: 0, avail, release_pos: 0, single_used: false, multi_used: false }
    }
}

/// Side state for [`Mtx`]: a blocking mutex.
pub struct MutexSide {
    inner: Mutex<LockedState>,
}

/// Mutex try-lock reserve strategy.
pub struct Mtx;
impl sealed::Sealed for Mtx {}
impl Strategy for Mtx {
    type Side = MutexSide;

    fn new_side(avail: u64) -> Self::Side {
        MutexSide { inner: Mutex::new(LockedState::new(avail)) }
    }

    fn side_pos(side: &Self::Side) -> u64 {
        side.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pos
    }

    fn side_avail(side: &Self::Side) -> u64 {
        side.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).avail
    }

    fn reserve(side: &Self::Side, max_count: u64) -> Reservation {
        if max_count == 0 {
            return Reservation::FAILED;
        }
        let Ok(mut guard) = side.inner.try_lock() else {
            return Reservation::FAILED;
        };
        if guard.avail == 0 {
            return Reservation::FAILED;
        }
        let granted = guard.avail.min(max_count);
        guard.avail -= granted;
        let pos = guard.pos;
        guard.pos += granted;
        debug_assert_granted_bounded!(granted, max_count);
        Reservation { cnt: granted, pos }
    }

    fn release_single(side: &Self::Side, cnt: u64) {
        // Unlike reserve, release must succeed: blocking acquire.
        let mut guard = side.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        debug_assert_not_mixed_release!(guard.multi_used);
        guard.single_used = true;
        guard.avail += cnt;
    }

    fn release_multi(side: &Self::Side, cnt: u64, reservation_pos: u64) -> u64 {
        let Ok(mut guard) = side.inner.try_lock() else {
            return 0;
        };
        debug_assert_not_mixed_release!(guard.single_used);
        guard.multi_used = true;
        if guard.release_pos == reservation_pos {
            guard.avail += cnt;
            guard.release_pos += cnt;
            cnt
        } else {
            0
        }
    }

    fn release_scary(side: &Self::Side, cnt: u64) {
        let mut guard = side.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.avail += cnt;
    }
}

/// Side state for [`Spl`]: a hand-rolled test-and-set spinlock guarding an
/// `UnsafeCell`, since `std` has no spinlock primitive.
pub struct SpinSide {
    locked: AtomicBool,
    state: UnsafeCell<LockedState>,
}

unsafe impl Sync for SpinSide {}

struct SpinGuard<'a> {
    side: &'a SpinSide,
}

impl Deref for SpinGuard<'_> {
    type Target = LockedState;
    fn deref(&self) -> &LockedState {
        unsafe { &*self.side.state.get() }
    }
}

impl DerefMut for SpinGuard<'_> {
    fn deref_mut(&mut self) -> &mut LockedState {
        unsafe { &mut *self.side.state.get() }
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.side.locked.store(false, Ordering::Release);
    }
}

impl SpinSide {
    fn new(avail: u64) -> Self {
        Self { locked: AtomicBool::new(false), state: UnsafeCell::new(LockedState::new(avail)) }
    }

    fn try_lock(&self) -> Option<SpinGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|()| SpinGuard { side: self })
    }

    fn lock(&self) -> SpinGuard<'_> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            std::hint::spin_loop();
        }
    }
}

/// Spinlock (test-and-set) reserve strategy.
pub struct Spl;
impl sealed::Sealed for Spl {}
impl Strategy for Spl {
    type Side = SpinSide;

    fn new_side(avail: u64) -> Self::Side {
        SpinSide::new(avail)
    }

    fn side_pos(side: &Self::Side) -> u64 {
        side.lock().pos
    }

    fn side_avail(side: &Self::Side) -> u64 {
        side.lock().avail
    }

    fn reserve(side: &Self::Side, max_count: u64) -> Reservation {
        if max_count == 0 {
            return Reservation::FAILED;
        }
        let Some(mut guard) = side.try_lock() else {
            return Reservation::FAILED;
        };
        if guard.avail == 0 {
            return Reservation::FAILED;
        }
        let granted = guard.avail.min(max_count);
        guard.avail -= granted;
        let pos = guard.pos;
        guard.pos += granted;
        debug_assert_granted_bounded!(granted, max_count);
        Reservation { cnt: granted, pos }
    }

    fn release_single(side: &Self::Side, cnt: u64) {
        let mut guard = side.lock();
        debug_assert_not_mixed_release!(guard.multi_used);
        guard.single_used = true;
        guard.avail += cnt;
    }

    fn release_multi(side: &Self::Side, cnt: u64, reservation_pos: u64) -> u64 {
        let Some(mut guard) = side.try_lock() else {
            return 0;
        };
        debug_assert_not_mixed_release!(guard.single_used);
        guard.multi_used = true;
        if guard.release_pos == reservation_pos {
            guard.avail += cnt;
            guard.release_pos += cnt;
            cnt
        } else {
            0
        }
    }

    fn release_scary(side: &Self::Side, cnt: u64) {
        let mut guard = side.lock();
        guard.avail += cnt;
    }
}
