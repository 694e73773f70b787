//! Threaded round-trip tests. Producers and consumers fold the values they
//! handle into hash signatures; equal signatures prove the multiset and
//! per-producer order survived the queue.

mod common;

use common::HashSignature;
use ringmpmc::{Ring, RingConfig};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

#[test]
fn hash_roundtrip_one_producer_one_consumer() {
    const LOOPS: u64 = 1_000_000;

    let ring = Ring::<u64>::with_config(RingConfig::new(16).lazy_push(true)).unwrap();
    let mut h_in = HashSignature::new(1);
    let mut h_out = HashSignature::new(1);
    assert_eq!(h_in, h_out);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..LOOPS {
                h_in.add(i);
                while !ring.try_push(i) {
                    std::hint::spin_loop();
                }
            }
        });
        s.spawn(|| {
            for _ in 0..LOOPS {
                let v = loop {
                    if let Some(v) = ring.try_pop() {
                        break v;
                    }
                    std::hint::spin_loop();
                };
                h_out.add(v);
            }
        });
    });

    assert_eq!(h_in, h_out);
    assert_eq!(h_out.count(), LOOPS);
}

/// Three producers tag each value with their id; the single consumer keeps
/// one signature per producer. Per-producer FIFO makes the order-sensitive
/// signatures match. (A second consumer would break this: the queue makes
/// no ordering promise across consumers.)
#[test]
fn tagged_multi_producer_hashes_match() {
    const PRODUCERS: u64 = 3;
    const LOOPS: u64 = 300_000;

    let ring = Ring::<u64>::with_config(RingConfig::new(16).lazy_push(true)).unwrap();
    let remaining = AtomicUsize::new(PRODUCERS as usize);

    let tag = |id: u64, v: u64| (id << 56) | v;
    let untag = |raw: u64| (raw >> 56, raw & ((1 << 56) - 1));

    let mut h_in: Vec<HashSignature> = (0..PRODUCERS).map(HashSignature::new).collect();
    let mut h_out: Vec<HashSignature> = (0..PRODUCERS).map(HashSignature::new).collect();

    thread::scope(|s| {
        for (id, h) in h_in.iter_mut().enumerate() {
            let ring = &ring;
            let remaining = &remaining;
            s.spawn(move || {
                for i in 0..LOOPS {
                    h.add(i);
                    while !ring.try_push(tag(id as u64, i)) {
                        std::hint::spin_loop();
                    }
                }
                remaining.fetch_sub(1, Ordering::Release);
            });
        }

        s.spawn(|| loop {
            if let Some(raw) = ring.try_pop() {
                let (id, v) = untag(raw);
                h_out[id as usize].add(v);
            } else if remaining.load(Ordering::Acquire) == 0 && ring.is_empty() {
                break;
            }
        });
    });

    assert_eq!(h_in, h_out);
}

#[test]
fn many_producers_many_consumers_conserve_the_multiset() {
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 4;
    const LOOPS: u64 = 100_000;

    let ring = Ring::<u64>::new(64).unwrap();
    let remaining = AtomicUsize::new(PRODUCERS as usize);
    let popped_sum = AtomicU64::new(0);
    let popped_count = AtomicU64::new(0);

    thread::scope(|s| {
        for id in 0..PRODUCERS {
            let ring = &ring;
            let remaining = &remaining;
            s.spawn(move || {
                for i in 0..LOOPS {
                    let v = id * LOOPS + i;
                    while !ring.try_push(v) {
                        std::hint::spin_loop();
                    }
                }
                remaining.fetch_sub(1, Ordering::Release);
            });
        }

        for _ in 0..CONSUMERS {
            let ring = &ring;
            let remaining = &remaining;
            let popped_sum = &popped_sum;
            let popped_count = &popped_count;
            s.spawn(move || loop {
                if let Some(v) = ring.try_pop() {
                    popped_sum.fetch_add(v, Ordering::Relaxed);
                    popped_count.fetch_add(1, Ordering::Relaxed);
                } else if remaining.load(Ordering::Acquire) == 0 && ring.is_empty() {
                    break;
                }
            });
        }
    });

    let total = PRODUCERS * LOOPS;
    assert_eq!(popped_count.load(Ordering::Relaxed), total);
    assert_eq!(popped_sum.load(Ordering::Relaxed), (0..total).sum::<u64>());
}

/// A consumer racing a keep-n producer observes sequence numbers strictly
/// increasing, and every value it sees is one the producer wrote.
#[test]
fn keep_n_under_concurrency_yields_increasing_sequences() {
    const LOOPS: u64 = 200_000;

    let ring = Ring::<u64>::new(8).unwrap();
    let done = AtomicUsize::new(0);

    thread::scope(|s| {
        s.spawn(|| {
            for v in 0..LOOPS {
                ring.push_keep_n(v);
            }
            done.store(1, Ordering::Release);
        });
        s.spawn(|| {
            let mut last_index = None;
            let mut last_value = None;
            loop {
                if let Some((v, i)) = ring.try_pop_indexed() {
                    assert!(v < LOOPS);
                    if let Some(prev) = last_index {
                        assert!(i > prev, "sequence went backwards: {prev} -> {i}");
                    }
                    if let Some(prev) = last_value {
                        assert!(v > prev, "value order broken: {prev} -> {v}");
                    }
                    last_index = Some(i);
                    last_value = Some(v);
                } else if done.load(Ordering::Acquire) == 1 && ring.is_empty() {
                    break;
                }
            }
            // the newest value always survives to the consumer
            assert_eq!(last_value, Some(LOOPS - 1));
        });
    });
}

#[test]
fn all_lazy_modes_survive_contention() {
    const LOOPS: u64 = 50_000;

    for (lp, lz) in [(false, false), (false, true), (true, false), (true, true)] {
        let ring =
            Ring::<u64>::with_config(RingConfig::new(32).lazy_push(lp).lazy_pop(lz)).unwrap();
        let popped_sum = AtomicU64::new(0);

        thread::scope(|s| {
            for _ in 0..2 {
                let ring = &ring;
                s.spawn(move || {
                    for i in 0..LOOPS {
                        while !ring.try_push(i) {
                            std::hint::spin_loop();
                        }
                    }
                });
            }
            for _ in 0..2 {
                let ring = &ring;
                let popped_sum = &popped_sum;
                s.spawn(move || {
                    let mut got = 0;
                    while got < LOOPS {
                        if let Some(v) = ring.try_pop() {
                            popped_sum.fetch_add(v, Ordering::Relaxed);
                            got += 1;
                        }
                    }
                });
            }
        });

        assert_eq!(
            popped_sum.load(Ordering::Relaxed),
            2 * (0..LOOPS).sum::<u64>(),
            "multiset broken with lazy_push={lp} lazy_pop={lz}"
        );
    }
}
