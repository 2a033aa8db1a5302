//! Single-thread producer/consumer ping-pong over a small ring.
//! Run with `cargo run --bin ping_pong`.

use ringwell::{Cas, Config, Params, Ring, Side};

fn main() {
    let params = Params::compute(8, 4).expect("valid ring shape");
    let mut mem = vec![0u8; params.size()];
    let ring: Ring<'_, Cas> = Ring::init(params, Config::default(), &mut mem).expect("ring init");

    for i in 0u64..10 {
        let r = ring.reserve(Side::Tx, 1);
        assert_eq!(r.cnt, 1, "ring should never be full in single-thread ping-pong");
        unsafe {
            ring.access_mut(r.pos, 0)[0..8].copy_from_slice(&i.to_ne_bytes());
        }
        ring.release_single(Side::Rx, 1);

        let r2 = ring.reserve(Side::Rx, 1);
        let v = unsafe { u64::from_ne_bytes(ring.access_ref(r2.pos, 0)[0..8].try_into().unwrap()) };
        println!("round {i}: read back {v}");
        ring.release_single(Side::Tx, 1);
    }
}
