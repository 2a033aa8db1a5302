//! Debug-only assertion macros for conditions that should never occur in a
//! correct caller: releasing more than was reserved, and mixing
//! `release_single`/`release_multi` on the same side.

/// A side's `avail` never exceeds the ring's total block count.
macro_rules! debug_assert_avail_bounded {
    ($avail:expr, $blk_count:expr) => {
        debug_assert!(
            $avail <= $blk_count,
            "avail ({}) exceeds blk_count ({}); a release double-counted blocks",
            $avail,
            $blk_count
        );
    };
}

/// `release_single`/`release_multi` must not be mixed on the same side, in
/// either order. Checked with two per-side sticky flags: `release_single`
/// asserts `multi_used` hasn't been set, `release_multi` asserts
/// `single_used` hasn't been set, then each sets its own flag.
macro_rules! debug_assert_not_mixed_release {
    ($other_direction_used:expr) => {
        debug_assert!(
            !$other_direction_used,
            "release_single and release_multi must not be mixed on the same side; \
             whichever one runs second permanently stalls any release_multi caller \
             waiting on release_pos"
        );
    };
}

/// A reservation's granted count never exceeds what was requested.
macro_rules! debug_assert_granted_bounded {
    ($granted:expr, $max_count:expr) => {
        debug_assert!(
            $granted <= $max_count,
            "granted ({}) exceeds requested max_count ({})",
            $granted,
            $max_count
        );
    };
}

pub(crate) use debug_assert_avail_bounded;
pub(crate) use debug_assert_granted_bounded;
pub(crate) use debug_assert_not_mixed_release;
