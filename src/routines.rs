//! Bodies of the parallel-loop and parameter-lookup examples.
//!
//! The exported functions in [`ffi`](crate::ffi) only marshal raw pointers; the work and
//! the narration happen here so it can be exercised without going through the C ABI.

use std::io::Write;
use std::mem::size_of_val;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::errors::HostError;
use crate::host::{ParStruct, ParView};
use crate::log_write;
use crate::logs::LogSink;
use crate::params::{contains_substring, lookup_double, lookup_int_list};
use crate::parallel::{build_pool, report_workers, scaled_product, scaled_sum, WORKER_TEMPLATE};
use crate::printf;

/// Log file of the parallel-loop examples.
pub const EXAMPLE_LOG: &str = "example.log";

/// Value returned by [`do_nothing`].
pub const NOTHING: f64 = 5.0;

/// Parallel loop over the aggregate's arrays, then lookups driven by its string fields.
///
/// Resets `sink` and narrates every step into it. `y` receives
/// `X[i] * (a + b) * Z[i]`.
///
/// # Errors
/// Fails on the first log, length or lookup error; values written to `y` before the
/// failure are kept.
pub fn run_fun(
    par: &ParStruct,
    view: &ParView<'_>,
    y: &mut [f64],
    sink: &LogSink,
) -> Result<(), HostError> {
    debug!(n = view.x.len(), threads = view.threads, "fun");
    sink.reset()?;
    log_write!(sink, 0, "fun(...)\n\n")?;

    // a. parallel loop
    let pool = build_pool(view.threads).map_err(crate::errors::ParallelError::from)?;
    scaled_product(&pool, view.x, view.z, view.a, view.b, y)?;
    report_workers(&pool, sink, 0)?;

    // b. lookups
    log_write!(sink, 0, "\nstring-value: %s\n", view.txt)?;

    let value = lookup_double(par, view.txt)?;
    log_write!(sink, 0, "looked up value par->%s = %g\n", view.txt, value)?;

    log_write!(
        sink,
        0,
        "is \"%s\" in \"%s\": %s\n",
        view.txt,
        view.txtlist,
        contains_substring(view.txt, view.txtlist)
    )?;

    for (name, value) in lookup_int_list(par, view.txtlist)? {
        log_write!(sink, 0, "looked up value par->%s = %d\n", &name, value)?;
    }
    log_write!(sink, 0, "\n")?;

    // c. integer width
    log_write!(sink, 0, "sizeof(par->N) = %d\n", size_of_val(&par.N))?;
    Ok(())
}

/// Same loop as [`run_fun`] on bare arrays, then checks whether `txt` is `"a"`.
///
/// Appends to `sink` without resetting it.
#[allow(clippy::too_many_arguments)]
pub fn run_fun_nostruct(
    x: &[f64],
    y: &mut [f64],
    z: &[i32],
    a: f64,
    b: f64,
    threads: i32,
    txt: &str,
    sink: &LogSink,
) -> Result<(), HostError> {
    debug!(n = x.len(), threads, "fun_nostruct");
    log_write!(sink, 0, "fun_nostruct(...)\n")?;

    let pool = build_pool(threads).map_err(crate::errors::ParallelError::from)?;
    scaled_product(&pool, x, z, a, b, y)?;
    report_workers(&pool, sink, 0)?;

    log_write!(sink, 0, "\nstring-value: %s\n", txt)?;
    if txt == "a" {
        log_write!(sink, 0, "test was succesfull\n")?;
    } else {
        log_write!(sink, 0, "test was not succesfull\n")?;
    }
    log_write!(sink, 0, "\n")?;
    Ok(())
}

/// `y[i] = x[i] * (a + b)`, narrating to `out` instead of a log file.
///
/// Every worker of the pool writes its own [`WORKER_TEMPLATE`] line, in no fixed order.
pub fn run_fun_nostruct_alt<W: Write + Send>(
    x: &[f64],
    y: &mut [f64],
    a: f64,
    b: f64,
    threads: i32,
    out: &mut W,
) -> Result<(), HostError> {
    debug!(n = x.len(), threads, "fun_nostruct_alt");
    let pool = build_pool(threads).map_err(crate::errors::ParallelError::from)?;

    // stdout is best effort, like printf
    let _ = writeln!(out, "\nfun_nostruct_alt(...)");
    scaled_sum(&pool, x, a, b, y)?;

    let num_procs = num_cpus::get();
    let shared = Mutex::new(&mut *out);
    pool.broadcast(|ctx| {
        let line = printf::format(WORKER_TEMPLATE, &[ctx.index().into(), num_procs.into()]);
        if let (Ok(line), Ok(mut out)) = (line, shared.lock()) {
            let _ = out.write_all(line.as_bytes());
        }
    });
    let out = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(out);
    Ok(())
}

/// Writes a greeting to `out` and returns [`NOTHING`].
pub fn do_nothing(out: &mut impl Write) -> f64 {
    let _ = write!(out, "\nI do nothing!\n");
    NOTHING
}
