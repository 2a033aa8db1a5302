//! SPSC and MPMC throughput benchmarks built around `reserve`/
//! `release_single`/`release_multi`.

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ringwell::{Cas, Config, Params, Ring, Side, WaitStrategy};

const MSG_PER_PRODUCER: u64 = 1_000_000;

fn bench_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_reserve_release");
    group.throughput(Throughput::Elements(MSG_PER_PRODUCER));
    group.bench_function(BenchmarkId::new("ping_pong", MSG_PER_PRODUCER), |b| {
        b.iter(|| {
            let mut mem = vec![0u8; 1024 * 8];
            let params = Params::compute(8, 1024).unwrap();
            let ring: Ring<'_, Cas> = Ring::init(params, Config::default(), &mut mem).unwrap();
            let mut attempt = 0u32;
            for i in 0..MSG_PER_PRODUCER {
                loop {
                    let r = ring.reserve(Side::Tx, 1);
                    if r.cnt == 1 {
                        unsafe {
                            ring.access_mut(r.pos, 0)[0..8].copy_from_slice(&i.to_ne_bytes());
                        }
                        ring.release_single(Side::Rx, 1);
                        break;
                    }
                    WaitStrategy::Spin.wait(&mut attempt, None);
                }
                loop {
                    let r = ring.reserve(Side::Rx, 1);
                    if r.cnt == 1 {
                        black_box(unsafe { ring.access_ref(r.pos, 0)[0] });
                        ring.release_single(Side::Tx, 1);
                        break;
                    }
                    WaitStrategy::Spin.wait(&mut attempt, None);
                }
            }
        });
    });
    group.finish();
}

fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_release_multi");
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 200_000;
    group.throughput(Throughput::Elements(PRODUCERS * PER_PRODUCER));
    group.bench_function(BenchmarkId::new("release_multi", PRODUCERS), |b| {
        b.iter(|| {
            let mut mem = vec![0u8; 4096 * 8];
            let params = Params::compute(8, 4096).unwrap();
            let ring: Ring<'_, Cas> = Ring::init(params, Config::default(), &mut mem).unwrap();
            let ring = Arc::new(ring);

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|_| {
                    let ring = Arc::clone(&ring);
                    thread::spawn(move || {
                        let mut attempt = 0u32;
                        for i in 0..PER_PRODUCER {
                            loop {
                                let r = ring.reserve(Side::Tx, 1);
                                if r.cnt == 1 {
                                    unsafe {
                                        ring.access_mut(r.pos, 0)[0..8].copy_from_slice(&i.to_ne_bytes());
                                    }
                                    loop {
                                        if ring.release_multi(Side::Rx, 1, r.pos) == 1 {
                                            break;
                                        }
                                        WaitStrategy::Spin.wait(&mut attempt, None);
                                    }
                                    break;
                                }
                                WaitStrategy::Spin.wait(&mut attempt, None);
                            }
                        }
                    })
                })
                .collect();

            let consumer = {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut attempt = 0u32;
                    for _ in 0..(PRODUCERS * PER_PRODUCER) {
                        loop {
                            let r = ring.reserve(Side::Rx, 1);
                            if r.cnt == 1 {
                                black_box(unsafe { ring.access_ref(r.pos, 0)[0] });
                                loop {
                                    if ring.release_multi(Side::Tx, 1, r.pos) == 1 {
                                        break;
                                    }
                                    WaitStrategy::Spin.wait(&mut attempt, None);
                                }
                                break;
                            }
                            WaitStrategy::Spin.wait(&mut attempt, None);
                        }
                    }
                })
            };

            for p in producers {
                p.join().unwrap();
            }
            consumer.join().unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_spsc, bench_mpmc);
criterion_main!(benches);
