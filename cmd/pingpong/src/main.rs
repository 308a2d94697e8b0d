//! Ping-pong example
//!
//! Two coroutines hand a counter back and forth over a pair of
//! rendezvous channels.

use goro::{go, Channel, Runtime, RuntimeConfig, WaitGroup};
use std::sync::Arc;
use std::time::Instant;

const ROUNDS: u32 = 5;

fn main() {
    let rt = Runtime::new(RuntimeConfig::from_env()).expect("runtime init");
    rt.start().expect("runtime start");

    println!("=== goro ping-pong ({} rounds) ===\n", ROUNDS);
    let start = Instant::now();

    rt.block_on(|| {
        let ping: Channel<u32> = Channel::new(0);
        let pong: Channel<u32> = Channel::new(0);
        let wg = Arc::new(WaitGroup::new());
        wg.add(2);

        let (ping_a, pong_a, wg_a) = (ping.clone(), pong.clone(), Arc::clone(&wg));
        go(move || {
            for round in 0..ROUNDS {
                ping_a.push(round).unwrap();
                println!("[ping] sent {}", round);
                let reply = pong_a.pop().unwrap();
                println!("[ping] got reply {}", reply);
            }
            wg_a.done();
        })
        .unwrap();

        let wg_b = Arc::clone(&wg);
        go(move || {
            for _ in 0..ROUNDS {
                let v = ping.pop().unwrap();
                println!("[pong] echoing {}", v);
                pong.push(v).unwrap();
            }
            wg_b.done();
        })
        .unwrap();

        wg.wait().unwrap();
    })
    .expect("block_on");

    println!("\n=== done in {:?} ===", start.elapsed());
    rt.shutdown();
}
