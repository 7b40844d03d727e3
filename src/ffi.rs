//! Exported C interface.
//!
//! Every entry point validates the pointers and sizes it receives, runs the safe
//! implementation with panics caught at the boundary, and reports the outcome in one of
//! three ways:
//!
//! - status-returning functions return `HOSTFUNCS_SUCCESS` or a negative `HOSTFUNCS_*` code
//! - timed functions return the elapsed seconds, or `NaN` on failure
//! - `void` functions append a line describing the failure to their log file
//!
//! Failures are also reported through `tracing` at error level.

use std::panic::{catch_unwind, AssertUnwindSafe};

use libc::{c_char, c_int};
use tracing::error;

use crate::backends::gemm::{GemmBackend, NalgebraGemm, NdarrayGemm};
use crate::backends::solve::{DenseSolver, NalgebraLu, PackedLu};
use crate::errors::{HostError, ParamError};
use crate::host::{
    checked_len, slice_from_raw, slice_from_raw_mut, str_from_raw, JacobianPar, ParStruct,
    SolStruct,
};
use crate::jacobian::{check_dims, JacobianSystem};
use crate::linalg::{self, GemmDims, SolveDims, SparseDims, Threads};
use crate::log_write;
use crate::logs::{LogConfig, LogSink};
use crate::optimize::{OptimizeConfig, OPTIMIZE_LOG};
use crate::params::{lookup_double, lookup_int};
use crate::routines::{self, EXAMPLE_LOG};
use crate::{config, StatusCode, HOSTFUNCS_PANIC, HOSTFUNCS_SUCCESS};

enum Failure {
    Error(HostError),
    Panic,
}

impl Failure {
    fn status(&self) -> StatusCode {
        match self {
            Failure::Error(err) => err.status(),
            Failure::Panic => HOSTFUNCS_PANIC,
        }
    }

    fn message(&self) -> String {
        match self {
            Failure::Error(err) => err.to_string(),
            Failure::Panic => "panic".to_string(),
        }
    }
}

fn guarded<T>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, HostError>,
) -> Result<T, Failure> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            error!(function = name, error = %err, "call failed");
            Err(Failure::Error(err))
        }
        Err(_) => {
            error!(function = name, "caught panic at the C boundary");
            Err(Failure::Panic)
        }
    }
}

fn status_of(name: &'static str, f: impl FnOnce() -> Result<(), HostError>) -> StatusCode {
    match guarded(name, f) {
        Ok(()) => HOSTFUNCS_SUCCESS,
        Err(failure) => failure.status(),
    }
}

fn seconds_of(name: &'static str, f: impl FnOnce() -> Result<f64, HostError>) -> f64 {
    guarded(name, f).unwrap_or(f64::NAN)
}

fn logged(name: &'static str, sink: &LogSink, f: impl FnOnce() -> Result<(), HostError>) {
    if let Err(failure) = guarded(name, f) {
        let _ = log_write!(sink, 0, "%s failed: %s\n", name, failure.message());
    }
}

/// Sink used by the `void` examples: process print level, failures to write are dropped.
fn example_sink(file_name: &str) -> LogSink {
    LogSink::with_config(config::log_path(file_name), LogConfig::from_process())
}

/// Sink used by the explicit log functions: process print level, failures are reported.
fn host_sink(path: &str) -> LogSink {
    LogSink::with_config(
        path,
        LogConfig::default().with_threshold(config::print_level()),
    )
}

/// Number of elements in a buffer of the given extents.
fn element_count(name: &'static str, extents: &[usize]) -> Result<usize, ParamError> {
    extents
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .filter(|&n| n.checked_mul(std::mem::size_of::<f64>()).is_some())
        .ok_or(ParamError::SizeOverflow(name))
}

/// # Safety
/// A non-null `ptr` must point to a valid `T` for `'a`.
unsafe fn non_null<'a, T>(name: &'static str, ptr: *const T) -> Result<&'a T, ParamError> {
    unsafe { ptr.as_ref() }.ok_or(ParamError::NullPointer(name))
}

// ============================================================================
// Log files
// ============================================================================

/// Truncates (or creates) the log file at `path`.
///
/// # Returns
/// * `HOSTFUNCS_SUCCESS` on success
/// * `HOSTFUNCS_NULL_POINTER` if `path` is null
/// * `HOSTFUNCS_IO_ERROR` if the file cannot be opened
///
/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hostfuncs_log_create(path: *const c_char) -> StatusCode {
    status_of("hostfuncs_log_create", || {
        let path = unsafe { str_from_raw("path", path) }?;
        host_sink(path).reset()?;
        Ok(())
    })
}

/// Appends `text` verbatim to the log file at `path` if `level` passes the print level.
///
/// # Safety
/// `path` and `text` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn hostfuncs_log_write(
    path: *const c_char,
    level: i64,
    text: *const c_char,
) -> StatusCode {
    status_of("hostfuncs_log_write", || {
        let path = unsafe { str_from_raw("path", path) }?;
        let text = unsafe { str_from_raw("text", text) }?;
        host_sink(path).record_str(level, text)?;
        Ok(())
    })
}

/// Sets the process-wide print level used by all log files.
#[no_mangle]
pub extern "C" fn hostfuncs_set_print_level(level: i64) {
    config::set_print_level(level);
}

/// Returns the process-wide print level.
#[no_mangle]
pub extern "C" fn hostfuncs_get_print_level() -> i64 {
    config::print_level()
}

// ============================================================================
// Parameter lookup
// ============================================================================

/// Looks up a field of `par` by name as a double.
///
/// # Returns
/// * `HOSTFUNCS_SUCCESS` with the value stored in `value`
/// * `HOSTFUNCS_NULL_POINTER` if any pointer is null
/// * `HOSTFUNCS_UNKNOWN_FIELD` if `name` is not a field of `par`
///
/// # Safety
/// `par` and `value` must be null or valid; `name` must be null or a NUL-terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn par_lookup_double(
    par: *const ParStruct,
    name: *const c_char,
    value: *mut f64,
) -> StatusCode {
    status_of("par_lookup_double", || {
        let par = unsafe { non_null("par", par) }?;
        let name = unsafe { str_from_raw("name", name) }?;
        let value = unsafe { value.as_mut() }.ok_or(ParamError::NullPointer("value"))?;
        *value = lookup_double(par, name)?;
        Ok(())
    })
}

/// Looks up an integer field of `par` by name.
///
/// Returns `HOSTFUNCS_INVALID_ARGUMENT` if `name` is a double field, otherwise as
/// [`par_lookup_double`].
///
/// # Safety
/// As for [`par_lookup_double`].
#[no_mangle]
pub unsafe extern "C" fn par_lookup_int(
    par: *const ParStruct,
    name: *const c_char,
    value: *mut c_int,
) -> StatusCode {
    status_of("par_lookup_int", || {
        let par = unsafe { non_null("par", par) }?;
        let name = unsafe { str_from_raw("name", name) }?;
        let value = unsafe { value.as_mut() }.ok_or(ParamError::NullPointer("value"))?;
        *value = lookup_int(par, name)?;
        Ok(())
    })
}

// ============================================================================
// Parallel loops
// ============================================================================

/// Parallel loop `Y[i] = X[i] * (a + b) * Z[i]` followed by lookups driven by `txt` and
/// `txtlist`, narrated into `example.log`.
///
/// # Safety
/// `par` and `sol` must be null or valid, and the arrays and strings they point to must
/// satisfy [`ParStruct::view`]. `sol.Y` must hold `par.N` values and not overlap `X`.
#[no_mangle]
pub unsafe extern "C" fn fun(par: *const ParStruct, sol: *mut SolStruct) {
    let sink = example_sink(EXAMPLE_LOG);
    logged("fun", &sink, || {
        let par = unsafe { non_null("par", par) }?;
        let sol = unsafe { non_null("sol", sol.cast_const()) }?;
        let view = unsafe { par.view() }?;
        let y = unsafe { slice_from_raw_mut("Y", sol.Y, view.x.len()) }?;
        routines::run_fun(par, &view, y, &sink)
    });
}

/// [`fun`] on bare arrays, appending to `example.log`.
///
/// # Safety
/// `X`, `Y` and `Z` must hold `N` values each and `Y` must not overlap the others; `txt`
/// must be null or a NUL-terminated string.
#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn fun_nostruct(
    X: *const f64,
    Y: *mut f64,
    Z: *const c_int,
    N: c_int,
    a: f64,
    b: f64,
    threads: c_int,
    txt: *const c_char,
) {
    let sink = example_sink(EXAMPLE_LOG);
    logged("fun_nostruct", &sink, || {
        let n = checked_len("N", N)?;
        let x = unsafe { slice_from_raw("X", X, n) }?;
        let y = unsafe { slice_from_raw_mut("Y", Y, n) }?;
        let z = unsafe { slice_from_raw("Z", Z, n) }?;
        let txt = unsafe { str_from_raw("txt", txt) }?;
        routines::run_fun_nostruct(x, y, z, a, b, threads, txt, &sink)
    });
}

/// Parallel loop `Y[i] = X[i] * (a + b)` narrated to standard output.
///
/// `txt` is accepted for signature compatibility and not read.
///
/// # Safety
/// `X` and `Y` must hold `N` values each and must not overlap.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn fun_nostruct_alt(
    X: *const f64,
    Y: *mut f64,
    N: c_int,
    a: f64,
    b: f64,
    threads: c_int,
    _txt: *const c_char,
) {
    let _ = guarded("fun_nostruct_alt", || {
        let n = checked_len("N", N)?;
        let x = unsafe { slice_from_raw("X", X, n) }?;
        let y = unsafe { slice_from_raw_mut("Y", Y, n) }?;
        routines::run_fun_nostruct_alt(x, y, a, b, threads, &mut std::io::stdout())
    });
}

/// Prints a greeting and returns `5.0`.
#[no_mangle]
pub extern "C" fn do_nothing() -> f64 {
    guarded("do_nothing", || Ok(routines::do_nothing(&mut std::io::stdout())))
        .unwrap_or(f64::NAN)
}

// ============================================================================
// Linear algebra
// ============================================================================

#[allow(clippy::too_many_arguments)]
unsafe fn matmul_with<G: GemmBackend>(
    name: &'static str,
    nrep: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: f64,
    beta: f64,
    a: *const f64,
    b: *const f64,
    c: *mut f64,
    threads: Threads,
) -> f64 {
    seconds_of(name, || {
        let dims = GemmDims {
            nrep: checked_len("nrep", nrep)?,
            m: checked_len("m", m)?,
            n: checked_len("n", n)?,
            k: checked_len("k", k)?,
        };
        let len_a = element_count("A", &[dims.nrep, dims.m, dims.k])?;
        let len_b = element_count("B", &[dims.nrep, dims.k, dims.n])?;
        let len_c = element_count("C", &[dims.nrep, dims.m, dims.n])?;
        let a = unsafe { slice_from_raw("A", a, len_a) }?;
        let b = unsafe { slice_from_raw("B", b, len_b) }?;
        let c = unsafe { slice_from_raw_mut("C", c, len_c) }?;
        Ok(linalg::matmul::<G>(dims, alpha, beta, a, b, c, threads)?)
    })
}

/// `nrep` products `C_i = alpha * A_i * B_i + beta * C_i` through ndarray.
///
/// All blocks are row-major and stored back to back: `A` holds `nrep` m×k blocks, `B`
/// k×n blocks and `C` m×n blocks.
///
/// # Returns
/// Elapsed seconds, or `NaN` if the arguments are invalid
///
/// # Safety
/// `A`, `B` and `C` must hold the number of values given above; `C` must not overlap
/// `A` or `B`.
#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn matmul_ndarray(
    nrep: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: f64,
    beta: f64,
    A: *const f64,
    B: *const f64,
    C: *mut f64,
    threads_inner: c_int,
    threads_outer: c_int,
) -> f64 {
    let threads = Threads::new(threads_inner, threads_outer);
    unsafe {
        matmul_with::<NdarrayGemm>(
            "matmul_ndarray",
            nrep,
            m,
            n,
            k,
            alpha,
            beta,
            A,
            B,
            C,
            threads,
        )
    }
}

/// [`matmul_ndarray`] through nalgebra.
///
/// # Safety
/// As for [`matmul_ndarray`].
#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub unsafe extern "C" fn matmul_nalgebra(
    nrep: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: f64,
    beta: f64,
    A: *const f64,
    B: *const f64,
    C: *mut f64,
    threads_inner: c_int,
    threads_outer: c_int,
) -> f64 {
    let threads = Threads::new(threads_inner, threads_outer);
    unsafe {
        matmul_with::<NalgebraGemm>(
            "matmul_nalgebra",
            nrep,
            m,
            n,
            k,
            alpha,
            beta,
            A,
            B,
            C,
            threads,
        )
    }
}

unsafe fn solve_with<S: DenseSolver>(
    name: &'static str,
    nrep: c_int,
    n: c_int,
    nrhs: c_int,
    a: *mut f64,
    b: *mut f64,
    threads: Threads,
) -> f64 {
    seconds_of(name, || {
        let dims = SolveDims {
            nrep: checked_len("nrep", nrep)?,
            n: checked_len("n", n)?,
            nrhs: checked_len("nrhs", nrhs)?,
        };
        let len_a = element_count("A", &[dims.nrep, dims.n, dims.n])?;
        let len_b = element_count("b", &[dims.nrep, dims.n, dims.nrhs])?;
        let a = unsafe { slice_from_raw_mut("A", a, len_a) }?;
        let b = unsafe { slice_from_raw_mut("b", b, len_b) }?;
        Ok(linalg::solve::<S>(dims, a, b, threads)?)
    })
}

/// `nrep` dense solves `A_i X_i = b_i`, overwriting `b` with the solutions and `A` with
/// the packed LU factors.
///
/// `A` holds `nrep` row-major n×n blocks and `b` n×nrhs blocks.
///
/// # Returns
/// Elapsed seconds, or `NaN` if the arguments are invalid or a matrix is singular
///
/// # Safety
/// `A` and `b` must hold the number of values given above and must not overlap.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn solve_lu(
    nrep: c_int,
    n: c_int,
    nrhs: c_int,
    A: *mut f64,
    b: *mut f64,
    threads_inner: c_int,
    threads_outer: c_int,
) -> f64 {
    let threads = Threads::new(threads_inner, threads_outer);
    unsafe { solve_with::<PackedLu>("solve_lu", nrep, n, nrhs, A, b, threads) }
}

/// [`solve_lu`] leaving `A` unchanged.
///
/// # Safety
/// As for [`solve_lu`].
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn solve_nalgebra(
    nrep: c_int,
    n: c_int,
    nrhs: c_int,
    A: *mut f64,
    b: *mut f64,
    threads_inner: c_int,
    threads_outer: c_int,
) -> f64 {
    let threads = Threads::new(threads_inner, threads_outer);
    unsafe { solve_with::<NalgebraLu>("solve_nalgebra", nrep, n, nrhs, A, b, threads) }
}

/// `nrep` sparse solves `A_i x_i = b_i` with `A_i` given in CSR format.
///
/// Per block, `indptr` holds `nrow + 1` offsets, `indices` and `data` hold `nnz` entries
/// and `b` and `x` hold `nrow` values. Only square systems are supported.
///
/// # Returns
/// Elapsed seconds, or `NaN` if the arguments are invalid or a matrix is singular
///
/// # Safety
/// All arrays must hold the number of values given above; `x` must not overlap the
/// others.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn solve_sparse(
    nrep: c_int,
    nrow: c_int,
    ncol: c_int,
    nnz: c_int,
    indptr: *const c_int,
    indices: *const c_int,
    data: *const f64,
    b: *const f64,
    x: *mut f64,
    threads_inner: c_int,
    threads_outer: c_int,
) -> f64 {
    seconds_of("solve_sparse", || {
        let dims = SparseDims {
            nrep: checked_len("nrep", nrep)?,
            nrow: checked_len("nrow", nrow)?,
            ncol: checked_len("ncol", ncol)?,
            nnz: checked_len("nnz", nnz)?,
        };
        let len_indptr = element_count("indptr", &[dims.nrep, dims.nrow + 1])?;
        let len_entries = element_count("data", &[dims.nrep, dims.nnz])?;
        let len_x = element_count("x", &[dims.nrep, dims.nrow])?;
        let indptr = unsafe { slice_from_raw("indptr", indptr, len_indptr) }?;
        let indices = unsafe { slice_from_raw("indices", indices, len_entries) }?;
        let data = unsafe { slice_from_raw("data", data, len_entries) }?;
        let b = unsafe { slice_from_raw("b", b, len_x) }?;
        let x = unsafe { slice_from_raw_mut("x", x, len_x) }?;
        let threads = Threads::new(threads_inner, threads_outer);
        Ok(linalg::solve_sparse(dims, indptr, indices, data, b, x, threads)?)
    })
}

// ============================================================================
// Optimisation
// ============================================================================

/// Runs the optimisation example with its default settings, writing the outcome to
/// `example_NLopt.log`.
#[no_mangle]
pub extern "C" fn optimize() {
    let sink = example_sink(OPTIMIZE_LOG);
    logged("optimize", &sink, || {
        crate::optimize::run_logged(&OptimizeConfig::default(), &sink).map(drop)
    });
}

/// Runs the optimisation example with the given settings.
///
/// # Returns
/// * `HOSTFUNCS_SUCCESS` with the minimiser in `x[0..2]`, the minimum in `minf` and the
///   number of objective evaluations in `evals`
/// * `HOSTFUNCS_NULL_POINTER` if an output pointer is null
/// * `HOSTFUNCS_INVALID_ARGUMENT` for unusable settings
/// * `HOSTFUNCS_DELEGATE_FAILURE` if the optimiser fails
///
/// # Safety
/// `x` must hold two values; `minf` and `evals` must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn optimize_constrained(
    m: f64,
    alpha: f64,
    beta: f64,
    repeats: c_int,
    x: *mut f64,
    minf: *mut f64,
    evals: *mut c_int,
) -> StatusCode {
    status_of("optimize_constrained", || {
        let x = unsafe { slice_from_raw_mut("x", x, 2) }?;
        let minf = unsafe { minf.as_mut() }.ok_or(ParamError::NullPointer("minf"))?;
        let evals = unsafe { evals.as_mut() }.ok_or(ParamError::NullPointer("evals"))?;
        let config = OptimizeConfig {
            m,
            alpha,
            beta,
            repeats: checked_len("repeats", repeats)?,
            ..OptimizeConfig::default()
        };
        let report = crate::optimize::minimize(&config)?;
        x.copy_from_slice(&report.x);
        *minf = report.minf;
        *evals = c_int::try_from(report.evals).unwrap_or(c_int::MAX);
        Ok(())
    })
}

// ============================================================================
// Jacobian
// ============================================================================

/// Evaluates `y = f(x)` and the row-major Jacobian `Jx` for the parameters in `par`.
///
/// # Returns
/// * `HOSTFUNCS_SUCCESS` with `y` and `Jx` filled
/// * `HOSTFUNCS_NULL_POINTER` if `par` or one of its arrays is null
/// * `HOSTFUNCS_INVALID_ARGUMENT` unless `Nx >= 3` and `Ny == 2`
///
/// # Safety
/// `par` must be null or valid; `x` must hold `Nx` values, `y` `Ny` values and `Jx`
/// `Ny * Nx` values, with `y` and `Jx` not overlapping any other array.
#[no_mangle]
pub unsafe extern "C" fn jacobian(par: *const JacobianPar) -> StatusCode {
    status_of("jacobian", || {
        let par = unsafe { non_null("par", par) }?;
        let nx = checked_len("Nx", par.Nx)?;
        let ny = checked_len("Ny", par.Ny)?;
        check_dims(nx, ny)?;

        let x = unsafe { slice_from_raw("x", par.x.cast_const(), nx) }?;
        let y = unsafe { slice_from_raw_mut("y", par.y, ny) }?;
        let len_jx = element_count("Jx", &[ny, nx])?;
        let jx = unsafe { slice_from_raw_mut("Jx", par.Jx, len_jx) }?;

        let out = JacobianSystem::new(nx)?.evaluate(x, par.alpha, par.beta)?;
        y.copy_from_slice(&out.y);
        jx.copy_from_slice(&out.jx);
        Ok(())
    })
}
