//! Exhaustive interleaving check of the CAS reserve algorithm.
//!
//! The production `Ring<S>` always uses real `std` atomics (see
//! `src/strategy.rs`); swapping every atomic in the crate through a
//! `loom`/`std` shim would also require routing `SpinSide`'s `UnsafeCell`
//! through `loom::cell::UnsafeCell`, which doesn't drop in cleanly behind
//! the spinlock guard's `Deref`/`DerefMut`. Instead this model
//! re-implements just the racy part — two threads racing
//! `compare_exchange_weak` on `avail` — with `loom`'s atomics, and checks
//! the invariant that matters: no block is ever handed out to more than one
//! reserver.
//!
//! Run with: `cargo test --features loom --test loom_tests`.
#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicU64, Ordering};
use loom::sync::Arc;
use loom::thread;

fn cas_reserve(avail: &AtomicU64, max_count: u64) -> u64 {
    let mut current = avail.load(Ordering::Relaxed);
    loop {
        if current == 0 {
            return 0;
        }
        let granted = current.min(max_count);
        match avail.compare_exchange_weak(
            current,
            current - granted,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return granted,
            Err(actual) => current = actual,
        }
    }
}

#[test]
fn two_reservers_never_overdraw() {
    loom::model(|| {
        let avail = Arc::new(AtomicU64::new(3));
        let total_granted = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let avail = Arc::clone(&avail);
                let total_granted = Arc::clone(&total_granted);
                thread::spawn(move || {
                    let granted = cas_reserve(&avail, 2);
                    total_granted.fetch_add(granted, Ordering::Relaxed);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(total_granted.load(Ordering::Relaxed) <= 3);
        assert_eq!(avail.load(Ordering::Relaxed) + total_granted.load(Ordering::Relaxed), 3);
    });
}
