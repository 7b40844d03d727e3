//! Kernel Benchmarks
//!
//! Measures the two hot paths of the crate:
//!
//! ### 1. Parallel loop (`benchmark_scaled_product`)
//! `Y = X * (a + b) * Z` over a fixed array with an increasing number of workers. Pool
//! construction is excluded; only the loop itself is timed.
//!
//! ### 2. Batched products (`benchmark_matmul`)
//! A batch of square products through the `ndarray` and `nalgebra` backends, for a few
//! matrix sizes, with the batch spread over four workers.
//!
//! Run with: `cargo bench --bench kernels`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hostfuncs::backends::gemm::{GemmBackend, NalgebraGemm, NdarrayGemm};
use hostfuncs::linalg::{matmul, GemmDims, Threads};
use hostfuncs::parallel::{build_pool, scaled_product};

const LOOP_LEN: usize = 1 << 20;
const BATCH: usize = 64;

fn benchmark_scaled_product(c: &mut Criterion) {
    let x: Vec<f64> = (0..LOOP_LEN).map(|i| i as f64).collect();
    let z: Vec<i32> = (0..LOOP_LEN).map(|i| (i % 7) as i32).collect();
    let mut y = vec![0.0; LOOP_LEN];

    let mut group = c.benchmark_group("Scaled Product");
    for threads in [1, 2, 4, 8] {
        let pool = build_pool(threads).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &pool, |b, pool| {
            b.iter(|| {
                scaled_product(pool, black_box(&x), black_box(&z), 2.0, 3.0, &mut y).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_backend<G: GemmBackend>(c: &mut Criterion, size: usize, a: &[f64], b: &[f64]) {
    let dims = GemmDims {
        nrep: BATCH,
        m: size,
        n: size,
        k: size,
    };
    let mut out = vec![0.0; BATCH * size * size];
    c.bench_with_input(
        BenchmarkId::new(format!("Matmul/{}", G::NAME), size),
        &dims,
        |bench, &dims| {
            bench.iter(|| {
                matmul::<G>(
                    dims,
                    1.0,
                    0.0,
                    black_box(a),
                    black_box(b),
                    &mut out,
                    Threads::new(1, 4),
                )
                .unwrap()
            })
        },
    );
}

fn benchmark_matmul(c: &mut Criterion) {
    for size in [8, 32, 64] {
        let len = BATCH * size * size;
        let a: Vec<f64> = (0..len).map(|i| (i % 17) as f64 / 17.0).collect();
        let b: Vec<f64> = (0..len).map(|i| (i % 13) as f64 / 13.0).collect();

        bench_backend::<NdarrayGemm>(c, size, &a, &b);
        bench_backend::<NalgebraGemm>(c, size, &a, &b);
    }
}

criterion_group!(benches, benchmark_scaled_product, benchmark_matmul);
criterion_main!(benches);
