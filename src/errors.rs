//! Error types for the hostfuncs crate.
//!
//! Every failure domain has its own enum so the Rust API can be precise about what went
//! wrong. The main error types are:
//!
//! - `FormatError`: Errors while rendering a C-style format template
//! - `LogError`: Errors from the diagnostic log sink
//! - `ParamError`: Errors while resolving fields of a configuration aggregate
//! - `ParallelError`, `LinalgError`, `OptimizeError`, `JacobianError`: Errors from the
//!   example computations and the libraries they delegate to
//!
//! `HostError` wraps all of them and maps each onto the status codes returned through the
//! C interface.

use std::path::PathBuf;

use evalexpr_jit::errors::EquationError;
use thiserror::Error;

use crate::{
    StatusCode, HOSTFUNCS_DELEGATE_FAILURE, HOSTFUNCS_INVALID_ARGUMENT, HOSTFUNCS_IO_ERROR,
    HOSTFUNCS_NULL_POINTER, HOSTFUNCS_UNKNOWN_FIELD,
};

/// Errors that can occur while rendering a printf-style template.
///
/// C leaves all of these undefined; here they are reported instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A directive needs an argument but the argument list is exhausted
    #[error("missing argument #{index} for format directive")]
    MissingArgument { index: usize },
    /// The argument at `index` cannot be rendered by the conversion
    #[error("argument #{index} does not match conversion '%{conversion}'")]
    ArgumentMismatch { index: usize, conversion: char },
    /// The conversion character is not supported
    #[error("unsupported conversion '%{0}'")]
    UnsupportedConversion(char),
    /// The template ends in the middle of a directive
    #[error("template ends inside a format directive")]
    IncompleteDirective,
    /// A field width or precision is larger than `INT_MAX`
    #[error("field width or precision {0} is too large")]
    FieldTooLarge(u64),
}

/// Errors raised by the diagnostic log sink.
#[derive(Error, Debug)]
pub enum LogError {
    /// The log file could not be opened for writing or appending
    #[error("log target unavailable: {}", path.display())]
    TargetUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The record could not be rendered
    #[error("failed to format log record")]
    Format(#[from] FormatError),
}

/// Errors that can occur when resolving fields of a configuration aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The field name is not registered for the aggregate
    #[error("unknown field `{name}` (known fields: {known})")]
    UnknownField { name: String, known: String },
    /// The field exists but holds a different numeric type
    #[error("field `{name}` is not of type {expected}")]
    FieldTypeMismatch { name: String, expected: &'static str },
    /// A pointer handed over by the host was null
    #[error("null pointer for `{0}`")]
    NullPointer(&'static str),
    /// A string handed over by the host is not valid UTF-8
    #[error("string `{0}` is not valid UTF-8")]
    InvalidUtf8(&'static str),
    /// A size handed over by the host is negative
    #[error("negative size for `{name}`: {value}")]
    NegativeSize { name: &'static str, value: i64 },
    /// The element count of a host buffer does not fit in memory
    #[error("size of `{0}` overflows")]
    SizeOverflow(&'static str),
}

/// Errors from the parallel element-wise loops.
#[derive(Error, Debug)]
pub enum ParallelError {
    /// The worker pool could not be started
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    /// Input and output arrays differ in length
    #[error("array `{name}` has length {got}, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Errors from the batched linear algebra routines.
#[derive(Error, Debug)]
pub enum LinalgError {
    /// A buffer is too small for the requested batch
    #[error("buffer `{name}` holds {got} values, expected {expected}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    /// The sparse solve only supports square systems
    #[error("sparse system must be square, got {nrow}x{ncol}")]
    NotSquare { nrow: usize, ncol: usize },
    /// The LU factorisation of a batch entry is singular
    #[error("matrix of repetition {rep} is singular")]
    Singular { rep: usize },
    /// The CSR data of a batch entry was rejected by nalgebra-sparse
    #[error("invalid CSR data in repetition {rep}: {message}")]
    InvalidSparse { rep: usize, message: String },
    /// A block could not be viewed with the requested shape
    #[error("invalid block shape")]
    Shape(#[from] ndarray::ShapeError),
    /// The worker pool could not be started
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors from the constrained optimisation example.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// The optimiser stopped with a failure status
    #[error("optimizer failed with status {status}")]
    Failed { status: String, x: Vec<f64>, minf: f64 },
    /// The problem settings are not usable
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}

/// Errors from the Jacobian example.
#[derive(Error, Debug)]
pub enum JacobianError {
    /// The system only produces two outputs and reads the first three inputs
    #[error("expected Nx >= 3 and Ny == 2, got Nx = {nx}, Ny = {ny}")]
    InvalidDimensions { nx: usize, ny: usize },
    /// Building or evaluating the differentiated system failed
    #[error("failed to differentiate system")]
    Equation(#[from] EquationError),
}

/// Umbrella error for everything the crate can report.
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Parallel(#[from] ParallelError),
    #[error(transparent)]
    Linalg(#[from] LinalgError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
    #[error(transparent)]
    Jacobian(#[from] JacobianError),
}

impl HostError {
    /// Status code reported through the C interface for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            HostError::Param(ParamError::UnknownField { .. }) => HOSTFUNCS_UNKNOWN_FIELD,
            HostError::Param(ParamError::NullPointer(_)) => HOSTFUNCS_NULL_POINTER,
            HostError::Log(LogError::TargetUnavailable { .. }) => HOSTFUNCS_IO_ERROR,
            HostError::Linalg(LinalgError::Singular { .. })
            | HostError::Linalg(LinalgError::InvalidSparse { .. })
            | HostError::Optimize(OptimizeError::Failed { .. })
            | HostError::Jacobian(JacobianError::Equation(_)) => HOSTFUNCS_DELEGATE_FAILURE,
            _ => HOSTFUNCS_INVALID_ARGUMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unknown = HostError::from(ParamError::UnknownField {
            name: "zzz".to_string(),
            known: "a, b".to_string(),
        });
        assert_eq!(unknown.status(), HOSTFUNCS_UNKNOWN_FIELD);

        let singular = HostError::from(LinalgError::Singular { rep: 0 });
        assert_eq!(singular.status(), HOSTFUNCS_DELEGATE_FAILURE);

        let null = HostError::from(ParamError::NullPointer("par"));
        assert_eq!(null.status(), HOSTFUNCS_NULL_POINTER);

        let mismatch = HostError::from(FormatError::MissingArgument { index: 0 });
        assert_eq!(mismatch.status(), HOSTFUNCS_INVALID_ARGUMENT);
    }

    #[test]
    fn test_messages() {
        let err = ParamError::UnknownField {
            name: "zzz".to_string(),
            known: "a, b".to_string(),
        };
        assert_eq!(err.to_string(), "unknown field `zzz` (known fields: a, b)");

        let err = FormatError::ArgumentMismatch {
            index: 1,
            conversion: 'd',
        };
        assert_eq!(err.to_string(), "argument #1 does not match conversion '%d'");
    }
}
