//! Data-parallel element-wise loops on a per-call worker pool.
//!
//! Every call builds a pool with the caller's thread count. Workers write disjoint slots of
//! the pre-allocated output, so the result never depends on the number of threads or on
//! scheduling order.
//!
//! # Example
//!
//! ```
//! use hostfuncs::parallel::{build_pool, scaled_product};
//!
//! let pool = build_pool(2).unwrap();
//! let mut y = vec![0.0; 4];
//! scaled_product(&pool, &[1.0, 2.0, 3.0, 4.0], &[1, 1, 1, 1], 2.0, 3.0, &mut y).unwrap();
//! assert_eq!(y, vec![5.0, 10.0, 15.0, 20.0]);
//! ```

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::errors::{LogError, ParallelError};
use crate::log_write;
use crate::logs::LogSink;

/// Builds a pool with `threads` workers; anything below one means one.
pub fn build_pool(threads: i32) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    let threads = usize::try_from(threads).unwrap_or(0).max(1);
    debug!(threads, "building worker pool");
    ThreadPoolBuilder::new().num_threads(threads).build()
}

fn check_len(name: &'static str, expected: usize, got: usize) -> Result<(), ParallelError> {
    if expected != got {
        return Err(ParallelError::LengthMismatch {
            name,
            expected,
            got,
        });
    }
    Ok(())
}

/// Computes `y[i] = x[i] * (a + b) * z[i]` on `pool`.
///
/// # Errors
/// Returns [`ParallelError::LengthMismatch`] if `z` or `y` differ in length from `x`.
pub fn scaled_product(
    pool: &ThreadPool,
    x: &[f64],
    z: &[i32],
    a: f64,
    b: f64,
    y: &mut [f64],
) -> Result<(), ParallelError> {
    check_len("Z", x.len(), z.len())?;
    check_len("Y", x.len(), y.len())?;
    let scale = a + b;
    pool.install(|| {
        y.par_iter_mut()
            .zip(x.par_iter().zip(z.par_iter()))
            .for_each(|(yi, (&xi, &zi))| *yi = xi * scale * f64::from(zi));
    });
    Ok(())
}

/// Computes `y[i] = x[i] * (a + b)` on `pool`.
pub fn scaled_sum(
    pool: &ThreadPool,
    x: &[f64],
    a: f64,
    b: f64,
    y: &mut [f64],
) -> Result<(), ParallelError> {
    check_len("Y", x.len(), y.len())?;
    let scale = a + b;
    pool.install(|| {
        y.par_iter_mut()
            .zip(x.par_iter())
            .for_each(|(yi, &xi)| *yi = xi * scale);
    });
    Ok(())
}

/// Line each worker writes from inside the parallel region.
pub const WORKER_TEMPLATE: &str = "omp_get_thread_num() = %2d, omp_get_num_procs() = %2d\n";

/// Has every worker of `pool` record its index and the processor count.
///
/// All workers append concurrently, so the lines can land in any order.
pub fn report_workers(pool: &ThreadPool, sink: &LogSink, level: i64) -> Result<(), LogError> {
    let num_procs = num_cpus::get();
    pool.broadcast(|ctx| log_write!(sink, level, WORKER_TEMPLATE, ctx.index(), num_procs))
        .into_iter()
        .collect()
}
