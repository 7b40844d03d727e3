use nalgebra::{DMatrixView, DMatrixViewMut};
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

use crate::errors::LinalgError;

/// A general matrix-matrix product on row-major blocks.
///
/// This trait lets the batched [`matmul`](crate::linalg::matmul) driver run against
/// different linear algebra libraries. Implementations compute
/// `C = alpha * A * B + beta * C` in place, where all three blocks are stored row-major:
/// `A` is m×k, `B` is k×n and `C` is m×n.
///
/// # Examples
///
/// ```rust
/// use hostfuncs::backends::gemm::{GemmBackend, NdarrayGemm};
///
/// let a = [1.0, 2.0, 3.0, 4.0];
/// let b = [1.0, 0.0, 0.0, 1.0];
/// let mut c = [1.0; 4];
/// NdarrayGemm::gemm(2, 2, 2, 1.0, &a, &b, 1.0, &mut c).unwrap();
/// assert_eq!(c, [2.0, 3.0, 4.0, 5.0]);
/// ```
pub trait GemmBackend {
    /// Short name used in diagnostics.
    const NAME: &'static str;

    /// Computes `C = alpha * A * B + beta * C`.
    ///
    /// # Arguments
    /// * `m`, `n`, `k` - Block dimensions
    /// * `alpha`, `beta` - Scalars of the update
    /// * `a` - m×k row-major block
    /// * `b` - k×n row-major block
    /// * `c` - m×n row-major block, updated in place
    ///
    /// # Returns
    /// An error if a slice is too short for its block
    #[allow(clippy::too_many_arguments)]
    fn gemm(
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: &[f64],
        b: &[f64],
        beta: f64,
        c: &mut [f64],
    ) -> Result<(), LinalgError>;
}

/// GEMM through `ndarray::linalg::general_mat_mul` on borrowed views.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdarrayGemm;

impl GemmBackend for NdarrayGemm {
    const NAME: &'static str = "ndarray";

    fn gemm(
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: &[f64],
        b: &[f64],
        beta: f64,
        c: &mut [f64],
    ) -> Result<(), LinalgError> {
        let a = ArrayView2::from_shape((m, k), a)?;
        let b = ArrayView2::from_shape((k, n), b)?;
        let mut c = ArrayViewMut2::from_shape((m, n), c)?;
        general_mat_mul(alpha, &a, &b, beta, &mut c);
        Ok(())
    }
}

/// GEMM through nalgebra's `gemm` on zero-copy views.
///
/// nalgebra is column-major, so a row-major block reads as its transpose. The product is
/// evaluated as `C^T = alpha * B^T * A^T + beta * C^T`, which leaves `C` row-major.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraGemm;

impl GemmBackend for NalgebraGemm {
    const NAME: &'static str = "nalgebra";

    fn gemm(
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: &[f64],
        b: &[f64],
        beta: f64,
        c: &mut [f64],
    ) -> Result<(), LinalgError> {
        check_block("A", m * k, a.len())?;
        check_block("B", k * n, b.len())?;
        check_block("C", m * n, c.len())?;

        let at = DMatrixView::from_slice(&a[..m * k], k, m);
        let bt = DMatrixView::from_slice(&b[..k * n], n, k);
        let mut ct = DMatrixViewMut::from_slice(&mut c[..m * n], n, m);
        ct.gemm(alpha, &bt, &at, beta);
        Ok(())
    }
}

fn check_block(name: &'static str, expected: usize, got: usize) -> Result<(), LinalgError> {
    if got < expected {
        return Err(LinalgError::DimensionMismatch {
            name,
            expected,
            got,
        });
    }
    Ok(())
}
