use thiserror::Error;

/// Errors raised while computing a ring's shape or attaching it to memory.
///
/// These are the only fallible, non-retryable call sites in the crate.
/// Contention failures from [`crate::Ring::reserve`] and
/// [`crate::Ring::release_multi`] are not errors — they are encoded as
/// `None` / `0` per the reserve/release protocol and are expected to happen
/// continuously under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstructError {
    /// `blk_size` was zero; there is no power of two to promote it to.
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    /// Promoting `blk_size` to the next power of two overflowed the backing integer.
    #[error("block size {requested} overflows when rounded up to a power of two")]
    BlockSizeOverflow {
        /// The block size the caller requested.
        requested: u64,
    },
    /// `blk_size * blk_count` overflowed before size promotion.
    #[error("{blk_size} * {blk_count} overflows")]
    TotalSizeOverflow {
        /// Promoted block size.
        blk_size: u64,
        /// Requested block count.
        blk_count: u64,
    },
    /// Promoting the total buffer size to the next power of two overflowed.
    #[error("buffer size {requested} overflows when rounded up to a power of two")]
    BufferSizeOverflow {
        /// The (already block-size-multiplied) size the caller requested.
        requested: u64,
    },
    /// The caller-supplied memory is smaller than [`crate::Params::size`].
    #[error("backing memory is {actual} bytes, need at least {required}")]
    BufferTooSmall {
        /// Bytes actually supplied.
        actual: usize,
        /// Bytes required by the computed [`crate::Params`].
        required: usize,
    },
}
