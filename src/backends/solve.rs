use nalgebra::DMatrix;

/// A dense linear solver on row-major blocks.
///
/// Implementations solve `A X = B` for a square n×n block `A` and an n×nrhs block `B`,
/// overwriting `B` with `X`. The driver is [`solve`](crate::linalg::solve).
pub trait DenseSolver {
    /// Short name used in diagnostics.
    const NAME: &'static str;

    /// Solves one system in place.
    ///
    /// # Arguments
    /// * `n` - Order of `A`
    /// * `nrhs` - Number of right-hand sides
    /// * `a` - n×n row-major block
    /// * `b` - n×nrhs row-major block, replaced by the solution
    ///
    /// # Returns
    /// `false` if `A` is singular, in which case `b` is left untouched
    fn solve(n: usize, nrhs: usize, a: &mut [f64], b: &mut [f64]) -> bool;
}

/// LU with partial pivoting, storing the factors back into `A` the way LAPACK `dgesv`
/// does: the unit-lower `L` strictly below the diagonal and `U` on and above it, both
/// of the row-permuted matrix.
///
/// # Examples
///
/// ```rust
/// use hostfuncs::backends::solve::{DenseSolver, PackedLu};
///
/// let mut a = [2.0, 0.0, 0.0, 4.0];
/// let mut b = [2.0, 2.0];
/// assert!(PackedLu::solve(2, 1, &mut a, &mut b));
/// assert_eq!(b, [1.0, 0.5]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedLu;

impl DenseSolver for PackedLu {
    const NAME: &'static str = "packed-lu";

    fn solve(n: usize, nrhs: usize, a: &mut [f64], b: &mut [f64]) -> bool {
        let lu = DMatrix::from_row_slice(n, n, &a[..n * n]).lu();

        let (l, u) = (lu.l(), lu.u());
        for i in 0..n {
            for j in 0..n {
                a[i * n + j] = if j < i { l[(i, j)] } else { u[(i, j)] };
            }
        }

        let rhs = DMatrix::from_row_slice(n, nrhs, &b[..n * nrhs]);
        match lu.solve(&rhs) {
            Some(x) => {
                write_row_major(&x, b);
                true
            }
            None => false,
        }
    }
}

/// LU with partial pivoting that leaves `A` as it was.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraLu;

impl DenseSolver for NalgebraLu {
    const NAME: &'static str = "nalgebra-lu";

    fn solve(n: usize, nrhs: usize, a: &mut [f64], b: &mut [f64]) -> bool {
        let lu = DMatrix::from_row_slice(n, n, &a[..n * n]).lu();
        let mut x = DMatrix::from_row_slice(n, nrhs, &b[..n * nrhs]);
        if !lu.solve_mut(&mut x) {
            return false;
        }
        write_row_major(&x, b);
        true
    }
}

/// Copies a column-major nalgebra matrix into a row-major buffer.
pub(crate) fn write_row_major(m: &DMatrix<f64>, out: &mut [f64]) {
    out[..m.len()].copy_from_slice(m.transpose().as_slice());
}
