//! Value and Jacobian of a small vector function.
//!
//! ```text
//! y0 = alpha * x0 + exp(x2)
//! y1 = beta * x1
//! ```
//!
//! The function reads the first three of `Nx >= 3` inputs; the remaining inputs only add
//! zero columns to the Jacobian. Derivatives come from the symbolic differentiation and
//! JIT compilation of `evalexpr-jit`, with `alpha` and `beta` passed as extra inputs so
//! one compiled system serves every parameter value.

use std::collections::HashMap;

use evalexpr_jit::system::EquationSystem;
use tracing::debug;

use crate::errors::JacobianError;

/// Number of outputs of the function.
pub const NY: usize = 2;

/// Smallest supported number of inputs.
pub const MIN_NX: usize = 3;

const EQUATIONS: [&str; NY] = ["alpha*x0 + exp(x2)", "beta*x1"];

/// Function value and row-major Jacobian at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianOutput {
    /// `Ny` function values
    pub y: Vec<f64>,
    /// `Ny * Nx` partial derivatives, `jx[i * Nx + j] = dy_i / dx_j`
    pub jx: Vec<f64>,
}

/// The compiled function for a fixed number of inputs.
pub struct JacobianSystem {
    system: EquationSystem,
    wrt: Vec<String>,
}

impl std::fmt::Debug for JacobianSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JacobianSystem")
            .field("equations", &self.system.equations())
            .field("wrt", &self.wrt)
            .finish()
    }
}

impl JacobianSystem {
    /// Compiles the function and its derivatives for `nx` inputs.
    ///
    /// # Errors
    /// [`JacobianError::InvalidDimensions`] if `nx < 3`, [`JacobianError::Equation`] if
    /// compilation fails.
    pub fn new(nx: usize) -> Result<Self, JacobianError> {
        check_dims(nx, NY)?;

        let wrt: Vec<String> = (0..nx).map(|j| format!("x{j}")).collect();
        let mut variables: HashMap<String, u32> = wrt
            .iter()
            .enumerate()
            .map(|(j, name)| (name.clone(), j as u32))
            .collect();
        variables.insert("alpha".to_string(), nx as u32);
        variables.insert("beta".to_string(), nx as u32 + 1);

        debug!(nx, "compiling jacobian system");
        let system = EquationSystem::from_var_map(
            EQUATIONS.iter().map(|eq| eq.to_string()).collect(),
            &variables,
        )?;
        Ok(Self { system, wrt })
    }

    /// Number of inputs the system was compiled for.
    pub fn nx(&self) -> usize {
        self.wrt.len()
    }

    /// Evaluates the function and its Jacobian with respect to `x` at `x`.
    ///
    /// # Errors
    /// [`JacobianError::Equation`] if `x` does not hold exactly [`nx`](Self::nx) values.
    pub fn evaluate(
        &self,
        x: &[f64],
        alpha: f64,
        beta: f64,
    ) -> Result<JacobianOutput, JacobianError> {
        let inputs: Vec<f64> = x.iter().copied().chain([alpha, beta]).collect();
        let y = self.system.eval(&inputs)?;
        let rows = self.system.eval_jacobian(&inputs, Some(self.wrt.as_slice()))?;
        Ok(JacobianOutput {
            y,
            jx: rows.into_iter().flatten().collect(),
        })
    }
}

/// Rejects shapes the function does not have.
pub fn check_dims(nx: usize, ny: usize) -> Result<(), JacobianError> {
    if nx < MIN_NX || ny != NY {
        return Err(JacobianError::InvalidDimensions { nx, ny });
    }
    Ok(())
}

/// Compiles the system for `x.len()` inputs and evaluates it once.
pub fn jacobian(x: &[f64], alpha: f64, beta: f64) -> Result<JacobianOutput, JacobianError> {
    JacobianSystem::new(x.len())?.evaluate(x, alpha, beta)
}
