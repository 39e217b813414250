//! Micro-benchmarks for BucketStore operations: put, closest_entries,
//! iteration and remove at varying store sizes. Reports nanoseconds-per-operation.
//!
//! Run: `cargo bench --bench bucket_store`

use kbucket_store::{BucketStore, Id};
use std::time::Instant;

fn main() {
    println!("bucket_store\n");

    bench_put();
    bench_closest();
    bench_iter();
    bench_remove();
}

fn filled(size: usize) -> BucketStore<u64> {
    let store = BucketStore::new(Id::random());

    for value in 0..size as u64 {
        let _ = store.put(Id::random(), value).unwrap();
    }

    store
}

fn bench_put() {
    println!("put");

    // Pre-generate random keys outside the timed section
    let keys: Vec<_> = (0..10_000).map(|_| Id::random()).collect();

    for size in [0, 100, 400] {
        let store = filled(size);

        let start = Instant::now();
        for (value, key) in keys.iter().cloned().enumerate() {
            let _ = store.put(key, value as u64).unwrap();
        }
        let per_op = start.elapsed().as_nanos() / keys.len() as u128;

        println!(
            "{size:>3} entries: {per_op}ns/op (final size: {})",
            store.len()
        );
    }

    println!();
}

fn bench_closest() {
    println!("closest_entries");

    let targets: Vec<_> = (0..1000).map(|_| Id::random()).collect();

    for size in [50, 100, 200, 400] {
        let store = filled(size);

        let start = Instant::now();
        for target in &targets {
            let _ = store.closest_entries(target, 20).unwrap();
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;

        println!("{size:>3} entries: {per_op}ns/op");
    }

    println!();
}

fn bench_iter() {
    println!("iter");

    let store = filled(400);
    let n = store.len();

    let start = Instant::now();
    let count = store.iter().count();
    let per_op = start.elapsed().as_nanos() / n.max(1) as u128;

    println!("{per_op}ns/entry ({count} entries)");
    println!();
}

fn bench_remove() {
    println!("remove");

    let store = filled(400);
    let keys: Vec<Id> = store.key_set().to_vec();

    let n = keys.len();
    let start = Instant::now();
    for key in &keys {
        let _ = store.remove(key).unwrap();
    }
    let per_op = start.elapsed().as_nanos() / n.max(1) as u128;

    println!("{per_op}ns/op ({n} removals)");
    println!();
}
