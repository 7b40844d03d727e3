//! C-callable example entry points for numeric host environments.
//!
//! This crate builds a shared library whose exported functions are called by an external
//! host process (a numeric or scripting environment) that owns all array memory. Each
//! entry point demonstrates one narrow technique:
//!
//! - a parallel element-wise loop over caller-owned arrays
//! - looking up a field of a configuration aggregate by its name
//! - batched matrix multiply, dense solve and sparse solve, with timing
//! - a constrained optimisation delegated to COBYLA
//! - a Jacobian delegated to the symbolic differentiation of `evalexpr-jit`
//!
//! Progress is narrated into plain text log files through a [`LogSink`](logs::LogSink),
//! with C `printf` formatting semantics.
//!
//! # Example
//!
//! ```rust
//! use hostfuncs::parallel::{build_pool, scaled_product};
//!
//! let pool = build_pool(4).unwrap();
//! let mut y = vec![0.0; 4];
//! scaled_product(&pool, &[1.0, 2.0, 3.0, 4.0], &[1, 1, 1, 1], 2.0, 3.0, &mut y).unwrap();
//! assert_eq!(y, vec![5.0, 10.0, 15.0, 20.0]);
//! ```

pub use errors::HostError;
pub use logs::{LogConfig, LogSink};

pub mod prelude {
    pub use crate::errors::HostError;
    pub use crate::host::{JacobianPar, ParStruct, SolStruct};
    pub use crate::log_write;
    pub use crate::logs::{FailurePolicy, LogConfig, LogSink};
    pub use crate::params::{lookup_double, lookup_int, lookup_int_list, Introspect};
    pub use crate::printf::Arg;
}

/// Status code returned through the C interface
pub type StatusCode = libc::c_int;

pub const HOSTFUNCS_SUCCESS: StatusCode = 0;
pub const HOSTFUNCS_NULL_POINTER: StatusCode = -1;
pub const HOSTFUNCS_INVALID_ARGUMENT: StatusCode = -2;
pub const HOSTFUNCS_UNKNOWN_FIELD: StatusCode = -3;
pub const HOSTFUNCS_DELEGATE_FAILURE: StatusCode = -4;
pub const HOSTFUNCS_IO_ERROR: StatusCode = -5;
pub const HOSTFUNCS_PANIC: StatusCode = -6;

/// Process-wide print level and log directory
pub mod config;
/// Error types for the various failure modes
pub mod errors;
/// Exported `extern "C"` entry points
pub mod ffi;
/// `#[repr(C)]` aggregates exchanged with the host
pub mod host;
/// Value and Jacobian of the autodiff example
pub mod jacobian;
/// Batched linear algebra drivers
pub mod linalg;
/// Append-only diagnostic log files
pub mod logs;
/// Constrained optimisation example
pub mod optimize;
/// Parallel element-wise loops
pub mod parallel;
/// Named field lookup
pub mod params;
/// C-style formatted output
pub mod printf;
/// Bodies of the parallel loop examples
pub mod routines;
/// Linear algebra backends
pub mod backends {
    pub mod gemm;
    pub mod solve;
}
