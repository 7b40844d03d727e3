//! Batched dense and sparse linear algebra with wall-clock timing.
//!
//! All inputs hold `nrep` independent row-major blocks stored back to back. The outer
//! loop over blocks runs on a worker pool of `threads.outer` workers; every block is
//! handed to a [backend](crate::backends) that delegates the arithmetic to ndarray,
//! nalgebra, nalgebra-sparse or faer. Each driver returns the elapsed seconds of the loop.
//!
//! # Example
//!
//! ```
//! use hostfuncs::backends::gemm::NdarrayGemm;
//! use hostfuncs::linalg::{matmul, GemmDims, Threads};
//!
//! let dims = GemmDims { nrep: 2, m: 1, n: 1, k: 2 };
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [1.0, 1.0, 2.0, 2.0];
//! let mut c = [0.0; 2];
//! let seconds = matmul::<NdarrayGemm>(dims, 1.0, 0.0, &a, &b, &mut c, Threads::new(1, 2)).unwrap();
//! assert_eq!(c, [3.0, 14.0]);
//! assert!(seconds >= 0.0);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::LuError;
use faer::sparse::{SparseColMat, Triplet};
use faer::ColMut;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use tracing::debug;

use crate::backends::gemm::GemmBackend;
use crate::backends::solve::DenseSolver;
use crate::errors::LinalgError;
use crate::parallel::build_pool;

/// Thread counts requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threads {
    /// Threads inside each kernel call. The pure-Rust kernels are single-threaded, so this
    /// is only reported.
    pub inner: i32,
    /// Workers of the loop over blocks.
    pub outer: i32,
}

impl Threads {
    pub fn new(inner: i32, outer: i32) -> Self {
        Self { inner, outer }
    }
}

impl Default for Threads {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Shape of a batched `C = alpha * A * B + beta * C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmDims {
    pub nrep: usize,
    /// rows of `A` and `C`
    pub m: usize,
    /// columns of `B` and `C`
    pub n: usize,
    /// columns of `A`, rows of `B`
    pub k: usize,
}

/// Shape of a batched dense solve `A X = B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveDims {
    pub nrep: usize,
    pub n: usize,
    pub nrhs: usize,
}

/// Shape of a batched sparse solve over CSR blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseDims {
    pub nrep: usize,
    pub nrow: usize,
    pub ncol: usize,
    /// stored entries per block
    pub nnz: usize,
}

fn check_len(name: &'static str, expected: usize, got: usize) -> Result<(), LinalgError> {
    if expected != got {
        return Err(LinalgError::DimensionMismatch {
            name,
            expected,
            got,
        });
    }
    Ok(())
}

/// Computes `C_i = alpha * A_i * B_i + beta * C_i` for every block with backend `G`.
///
/// # Arguments
/// * `dims` - Batch size and block shape
/// * `a` - `nrep` blocks of m×k
/// * `b` - `nrep` blocks of k×n
/// * `c` - `nrep` blocks of m×n, updated in place
/// * `threads` - Requested thread counts
///
/// # Returns
/// Elapsed seconds of the batch
pub fn matmul<G: GemmBackend>(
    dims: GemmDims,
    alpha: f64,
    beta: f64,
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    threads: Threads,
) -> Result<f64, LinalgError> {
    let GemmDims { nrep, m, n, k } = dims;
    let (size_a, size_b, size_c) = (m * k, k * n, m * n);
    check_len("A", nrep * size_a, a.len())?;
    check_len("B", nrep * size_b, b.len())?;
    check_len("C", nrep * size_c, c.len())?;

    debug!(backend = G::NAME, ?dims, inner = threads.inner, outer = threads.outer, "matmul");
    let pool = build_pool(threads.outer)?;

    let start = Instant::now();
    if size_c > 0 {
        pool.install(|| {
            c.par_chunks_mut(size_c)
                .enumerate()
                .try_for_each(|(rep, c_i)| {
                    let a_i = &a[rep * size_a..(rep + 1) * size_a];
                    let b_i = &b[rep * size_b..(rep + 1) * size_b];
                    G::gemm(m, n, k, alpha, a_i, b_i, beta, c_i)
                })
        })?;
    }
    Ok(start.elapsed().as_secs_f64())
}

/// Solves `A_i X_i = B_i` for every block with solver `S`.
///
/// `b` is overwritten by the solutions. Whether `a` is overwritten depends on `S`.
///
/// # Errors
/// [`LinalgError::Singular`] names a block whose matrix is singular; blocks that were
/// solved before it keep their solutions.
pub fn solve<S: DenseSolver>(
    dims: SolveDims,
    a: &mut [f64],
    b: &mut [f64],
    threads: Threads,
) -> Result<f64, LinalgError> {
    let SolveDims { nrep, n, nrhs } = dims;
    let (size_a, size_b) = (n * n, n * nrhs);
    check_len("A", nrep * size_a, a.len())?;
    check_len("b", nrep * size_b, b.len())?;

    debug!(solver = S::NAME, ?dims, inner = threads.inner, outer = threads.outer, "solve");
    let pool = build_pool(threads.outer)?;

    let start = Instant::now();
    if size_b > 0 {
        pool.install(|| {
            a.par_chunks_mut(size_a)
                .zip(b.par_chunks_mut(size_b))
                .enumerate()
                .try_for_each(|(rep, (a_i, b_i))| {
                    if S::solve(n, nrhs, a_i, b_i) {
                        Ok(())
                    } else {
                        Err(LinalgError::Singular { rep })
                    }
                })
        })?;
    }
    Ok(start.elapsed().as_secs_f64())
}

/// Solves `A_i x_i = b_i` for every CSR block.
///
/// # Arguments
/// * `dims` - Batch size, square block order and stored entries per block
/// * `indptr` - `nrow + 1` row offsets per block, relative to the block's entries
/// * `indices` - `nnz` column indices per block
/// * `data` - `nnz` values per block
/// * `b` - `nrow` right-hand side values per block
/// * `x` - `nrow` solution values per block
///
/// # Returns
/// Elapsed seconds of the batch
pub fn solve_sparse(
    dims: SparseDims,
    indptr: &[i32],
    indices: &[i32],
    data: &[f64],
    b: &[f64],
    x: &mut [f64],
    threads: Threads,
) -> Result<f64, LinalgError> {
    let SparseDims {
        nrep,
        nrow,
        ncol,
        nnz,
    } = dims;
    if nrow != ncol {
        return Err(LinalgError::NotSquare { nrow, ncol });
    }
    check_len("indptr", nrep * (nrow + 1), indptr.len())?;
    check_len("indices", nrep * nnz, indices.len())?;
    check_len("data", nrep * nnz, data.len())?;
    check_len("b", nrep * nrow, b.len())?;
    check_len("x", nrep * nrow, x.len())?;

    debug!(?dims, inner = threads.inner, outer = threads.outer, "solve_sparse");
    let pool = build_pool(threads.outer)?;

    let start = Instant::now();
    if nrow > 0 {
        pool.install(|| {
            x.par_chunks_mut(nrow)
                .enumerate()
                .try_for_each(|(rep, x_i)| {
                    let offsets = &indptr[rep * (nrow + 1)..(rep + 1) * (nrow + 1)];
                    let entries = rep * nnz..(rep + 1) * nnz;
                    let a = csr_block(
                        rep,
                        nrow,
                        offsets,
                        &indices[entries.clone()],
                        &data[entries],
                    )?;
                    x_i.copy_from_slice(&b[rep * nrow..(rep + 1) * nrow]);
                    sparse_lu_solve(rep, &a, x_i)
                })
        })?;
    }
    Ok(start.elapsed().as_secs_f64())
}

/// Validates one CSR block and assembles it for faer.
///
/// Rows may list their columns in any order; duplicate or out-of-range columns are rejected.
fn csr_block(
    rep: usize,
    n: usize,
    offsets: &[i32],
    indices: &[i32],
    values: &[f64],
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let invalid = |message: String| LinalgError::InvalidSparse { rep, message };
    let to_usize =
        |v: &i32| usize::try_from(*v).map_err(|_| invalid(format!("negative index {v}")));

    let offsets = offsets.iter().map(to_usize).collect::<Result<Vec<_>, _>>()?;
    let indices = indices.iter().map(to_usize).collect::<Result<Vec<_>, _>>()?;
    let csr = CsrMatrix::try_from_unsorted_csr_data(n, n, offsets, indices, values.to_vec())
        .map_err(|e| invalid(e.to_string()))?;

    let triplets: Vec<_> = csr
        .triplet_iter()
        .map(|(row, col, &val)| Triplet::new(row, col, val))
        .collect();
    SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| invalid(format!("{e:?}")))
}

/// Overwrites `x` (holding the right-hand side) with the solution of `a x = b`.
///
/// An exactly zero pivot panics inside faer; that and non-finite solutions are
/// reported as singular.
fn sparse_lu_solve(
    rep: usize,
    a: &SparseColMat<usize, f64>,
    x: &mut [f64],
) -> Result<(), LinalgError> {
    let solved = panic::catch_unwind(AssertUnwindSafe(|| {
        let lu = a.sp_lu()?;
        lu.solve_in_place(ColMut::from_slice_mut(&mut *x));
        Ok::<(), LuError>(())
    }));
    match solved {
        Ok(Ok(())) if x.iter().all(|v| v.is_finite()) => Ok(()),
        Ok(Err(LuError::Generic(e))) => Err(LinalgError::InvalidSparse {
            rep,
            message: format!("{e:?}"),
        }),
        _ => Err(LinalgError::Singular { rep }),
    }
}
