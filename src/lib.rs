//! A lock-free, block-oriented circular buffer ("well") for passing
//! fixed-size records between one or more producer threads and one or more
//! consumer threads in a single process.
//!
//! The core primitive is [`Ring`]: a caller-sized, caller-allocated buffer
//! split into a TX (producer-facing) half and an RX (consumer-facing) half,
//! each reserved and released independently under one of four selectable
//! synchronization strategies — [`Cas`], [`Xch`], [`Mtx`], [`Spl`] — chosen
//! as a type parameter so the hot reserve/release path monomorphizes to
//! straight-line code with no dynamic dispatch.
//!
//! Typical flow for a producer: [`Ring::reserve`] on [`Side::Tx`], write
//! into the blocks via [`Ring::access`]/[`Ring::access_mut`], then release
//! them to the consumer with [`Ring::release_single`] or
//! [`Ring::release_multi`] on [`Side::Rx`]. Consumers mirror this
//! symmetrically on [`Side::Rx`]/[`Side::Tx`]. A producer that needs to know
//! when everything it has sent so far has actually been consumed uses
//! [`Ring::snapshot`]/[`Ring::verif`], or the convenience
//! [`Ring::checkpoint_loop`].

mod backoff;
mod checkpoint;
mod error;
mod invariants;
mod metrics;
mod params;
mod ring;
mod strategy;

pub use backoff::WaitStrategy;
pub use checkpoint::{Checkpoint, CheckpointOutcome};
pub use error::ConstructError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use params::{Config, Params};
pub use ring::Ring;
pub use strategy::{Cas, Mtx, Reservation, Side, Spl, Strategy, Xch};
