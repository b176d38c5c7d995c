//! Notification pass benchmarks.
//!
//! Measures one `set` call against stores with growing listener counts, plus
//! a selector read through [`Reader`].
//!
//! Run with: cargo bench -p extstore-core --bench notify_bench

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use extstore_core::{Reader, Unsubscribe, provide_controls};

fn bench_set_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_state");
    for listeners in [1usize, 16, 256, 4096] {
        let (controls, set) = provide_controls(0u64);
        let hits = Rc::new(Cell::new(0u64));
        let _handles: Vec<Unsubscribe> = (0..listeners)
            .map(|_| {
                let h = Rc::clone(&hits);
                controls.subscribe(move || h.set(h.get() + 1))
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            &listeners,
            |b, _| {
                b.iter(|| set.update(|n| black_box(n + 1)));
            },
        );
    }
    group.finish();
}

fn bench_selector_read(c: &mut Criterion) {
    let (controls, _set) = provide_controls((0u64..1024).collect::<Vec<_>>());
    let reader = Reader::new(controls, |v: &Vec<u64>| v.iter().copied().sum::<u64>());
    c.bench_function("selector_read_sum_1024", |b| {
        b.iter(|| black_box(reader.read()));
    });
}

criterion_group!(benches, bench_set_state, bench_selector_read);
criterion_main!(benches);
