use criterion::{Criterion, BenchmarkId, black_box, criterion_group,
                criterion_main};

mod common;

fn bench_approx(c: &mut Criterion) {
    let ys = common::samples(1000);

    let mut group = c.benchmark_group("approx");
    for (name, approx, std) in common::approximations() {
        group.bench_function(
            BenchmarkId::new("magic", name),
            |b| b.iter(|| {
                let mut s = 0.;
                for &y in &ys { s += approx(black_box(y)) }
                s
            }));
        group.bench_function(
            BenchmarkId::new("std", name),
            |b| b.iter(|| {
                let mut s = 0.;
                for &y in &ys { s += std(black_box(y)) }
                s
            }));
    }
}

criterion_group!(benches, bench_approx);
criterion_main!(benches);
