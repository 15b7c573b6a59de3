use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringshare_core::{RingError, RingRegistry};

const KEY: &str = "shared-ring-test";

#[test]
fn producer_and_consumer_threads_see_ordered_stream() {
    const CAPACITY: usize = 4_096;
    const TOTAL: usize = 200_000;
    const WRITE_BLOCK: usize = 64;
    const READ_BLOCK: usize = 100;

    let registry = RingRegistry::new();
    let producer = registry.attach(KEY, CAPACITY).unwrap();
    let consumer = registry.attach(KEY, CAPACITY).unwrap();

    let writer = thread::spawn(move || {
        let mut next = 0usize;
        let mut block = [0f32; WRITE_BLOCK];
        while next < TOTAL {
            // Stay below capacity so nothing is overwritten.
            if producer.available() + WRITE_BLOCK > CAPACITY {
                thread::yield_now();
                continue;
            }
            for (i, slot) in block.iter_mut().enumerate() {
                *slot = (next + i) as f32;
            }
            producer.write(&block).unwrap();
            next += WRITE_BLOCK;
        }
        producer
    });

    let reader = thread::spawn(move || {
        let mut expected = 0usize;
        let mut out = [0f32; READ_BLOCK];
        let deadline = Instant::now() + Duration::from_secs(30);
        while expected < TOTAL {
            assert!(Instant::now() < deadline, "reader timed out at {expected}");
            match consumer.read(&mut out) {
                Ok(()) => {
                    for &sample in &out {
                        assert_eq!(sample, expected as f32, "out of order at {expected}");
                        expected += 1;
                    }
                }
                Err(e) if e.is_retryable() => thread::yield_now(),
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
        consumer
    });

    let producer = writer.join().expect("writer panicked");
    let consumer = reader.join().expect("reader panicked");

    let snap = consumer.diagnostics();
    assert_eq!(snap.samples_written, snap.samples_read);
    assert_eq!(snap.overrun_samples, 0);
    assert_eq!(consumer.available(), 0);

    producer.detach();
    consumer.detach();
    assert!(registry.is_empty());
}

#[test]
fn attach_detach_churn_does_not_disturb_traffic() {
    let registry = RingRegistry::new();
    let producer = registry.attach(KEY, 1_024).unwrap();
    let consumer = registry.attach(KEY, 1_024).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let churners: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut rounds = 0;
                while !stop.load(Ordering::Relaxed) || rounds < 200 {
                    let h = registry.attach(KEY, 1_024).unwrap();
                    assert!(h.ring().is_active());
                    h.detach();
                    rounds += 1;
                }
            })
        })
        .collect();

    let mut out = [0f32; 16];
    for round in 0..500u32 {
        let block: Vec<f32> = (0..16).map(|i| (round * 16 + i) as f32).collect();
        producer.write(&block).unwrap();
        consumer.read(&mut out).unwrap();
        assert_eq!(&out[..], &block[..]);
    }

    stop.store(true, Ordering::Relaxed);
    for c in churners {
        c.join().expect("churn thread panicked");
    }

    assert_eq!(registry.ref_count(KEY), Some(2));
    assert!(producer.ring().is_active());
    assert!(producer.shares_ring_with(&consumer));
}

#[test]
fn churn_through_zero_always_yields_live_rings() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 2_000;

    let registry = RingRegistry::new();
    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let h = registry.attach(KEY, 64).unwrap();
                    assert!(h.ring().is_active(), "thread {t} got a dead ring");
                    h.write(&[round as f32; 8]).unwrap();
                    h.detach();
                }
            })
        })
        .collect();

    for w in workers {
        w.join().expect("churn thread panicked");
    }
    assert!(registry.is_empty());
    assert_eq!(registry.ref_count(KEY), None);
}

#[test]
fn overflow_scenario_through_handles() {
    let registry = RingRegistry::new();
    let producer = registry.attach(KEY, 10).unwrap();
    let consumer = registry.attach(KEY, 10).unwrap();

    let first: Vec<f32> = (1..=10).map(|v| v as f32).collect();
    producer.write(&first).unwrap();
    assert_eq!(consumer.available(), 10);

    producer.write(&[11.0, 12.0]).unwrap();
    assert_eq!(consumer.available(), 10);

    let mut out = [0f32; 10];
    consumer.read(&mut out).unwrap();
    let expected: Vec<f32> = (3..=12).map(|v| v as f32).collect();
    assert_eq!(&out[..], &expected[..]);
}

#[test]
fn k_attaches_need_k_detaches() {
    const K: usize = 6;
    let registry = RingRegistry::new();
    let mut handles: Vec<_> = (0..K).map(|_| registry.attach(KEY, 32).unwrap()).collect();

    let last = handles.pop().unwrap();
    for h in handles {
        h.detach();
    }
    last.write(&[1.0, 2.0]).unwrap();
    let mut out = [0f32; 2];
    last.read(&mut out).unwrap();
    assert_eq!(out, [1.0, 2.0]);

    let ring_of_last = last.diagnostics();
    assert_eq!(ring_of_last.samples_written, 2);
    last.detach();
    assert!(!registry.contains(KEY));

    let fresh = registry.attach(KEY, 32).unwrap();
    assert_eq!(fresh.available(), 0);
    assert_eq!(fresh.diagnostics().samples_written, 0);
    assert!(matches!(
        fresh.read(&mut out),
        Err(RingError::InsufficientData { available: 0, .. })
    ));
}
