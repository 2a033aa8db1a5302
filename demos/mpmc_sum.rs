//! 4 producers / 4 consumers exchanging blocks via `release_multi`.
//! Run with `cargo run --bin mpmc_sum`.

use std::sync::Arc;
use std::thread;

use ringwell::{Cas, Config, Params, Ring, Side, WaitStrategy};

const PRODUCERS: u64 = 4;
const PER_PRODUCER: u64 = 250_000;

fn main() {
    let params = Params::compute(8, 1024).expect("valid ring shape");
    let mut mem = vec![0u8; params.size()];
    let ring: Ring<'_, Cas> = Ring::init(params, Config::default(), &mut mem).expect("ring init");
    let ring = Arc::new(ring);
    let total = PRODUCERS * PER_PRODUCER;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut attempt = 0u32;
                for i in 0..PER_PRODUCER {
                    let value = p * PER_PRODUCER + i;
                    loop {
                        let r = ring.reserve(Side::Tx, 1);
                        if r.cnt == 1 {
                            unsafe {
                                ring.access_mut(r.pos, 0)[0..8].copy_from_slice(&value.to_ne_bytes());
                            }
                            loop {
                                if ring.release_multi(Side::Rx, 1, r.pos) == 1 {
                                    break;
                                }
                                WaitStrategy::bounded().wait(&mut attempt, None);
                            }
                            break;
                        }
                        WaitStrategy::bounded().wait(&mut attempt, None);
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut sum = 0u128;
                let mut attempt = 0u32;
                for _ in 0..(total / PRODUCERS) {
                    loop {
                        let r = ring.reserve(Side::Rx, 1);
                        if r.cnt == 1 {
                            let v = unsafe {
                                u64::from_ne_bytes(ring.access_ref(r.pos, 0)[0..8].try_into().unwrap())
                            };
                            sum += u128::from(v);
                            loop {
                                if ring.release_multi(Side::Tx, 1, r.pos) == 1 {
                                    break;
                                }
                                WaitStrategy::bounded().wait(&mut attempt, None);
                            }
                            break;
                        }
                        WaitStrategy::bounded().wait(&mut attempt, None);
                    }
                }
                sum
            })
        })
        .collect();

    for p in producers {
        p.join().expect("producer thread panicked");
    }
    let sum: u128 = consumers.into_iter().map(|c| c.join().expect("consumer thread panicked")).sum();
    let expected = u128::from(total) * u128::from(total - 1) / 2;
    println!("sum = {sum} (expected {expected}, match = {})", sum == expected);
}
