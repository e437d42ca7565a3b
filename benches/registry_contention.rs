use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::thread;

use convergent_rc::PtrRegistry;

const CLONES_PER_THREAD: usize = 256;

// Benchmark 1: threads hammering one shared address (worst case: every
// clone/drop serializes on the same entry under the registry lock)
fn bench_shared_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_address");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("convergent_rc", num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let registry = PtrRegistry::new();
                    let root = registry.adopt(0u64);

                    let workers: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let seed = root.clone();
                            thread::spawn(move || {
                                for _ in 0..CLONES_PER_THREAD {
                                    let clone = seed.clone();
                                    black_box(&clone);
                                }
                            })
                        })
                        .collect();

                    for worker in workers {
                        let _ = worker.join();
                    }
                    black_box(root.ref_count());
                });
            },
        );
    }

    group.finish();
}

// Benchmark 2: threads working on disjoint addresses (the lock is shared,
// the entries are not)
fn bench_disjoint_addresses(c: &mut Criterion) {
    let mut group = c.benchmark_group("disjoint_addresses");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("convergent_rc", num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let registry = PtrRegistry::new();

                    let workers: Vec<_> = (0..num_threads)
                        .map(|worker| {
                            let registry = registry.clone();
                            thread::spawn(move || {
                                for round in 0..CLONES_PER_THREAD {
                                    let handle = registry.adopt((worker * round) as u64);
                                    let clone = handle.clone();
                                    black_box(&clone);
                                }
                            })
                        })
                        .collect();

                    for worker in workers {
                        let _ = worker.join();
                    }
                    black_box(registry.live_entries());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_shared_address, bench_disjoint_addresses);
criterion_main!(benches);
