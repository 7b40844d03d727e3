//! Constrained minimisation of a two-variable quadratic.
//!
//! The problem is
//!
//! ```text
//! minimise    (x0 - alpha)^2 + (x1 - beta)^2
//! subject to  0 <= x0 <= m,  0 <= x1 <= m,  x0 + x1 <= m
//! ```
//!
//! started from `(m/2, m/2)`. The optimisation itself is delegated to COBYLA; this module
//! counts evaluations, times the calls and narrates the outcome.
//!
//! # Example
//!
//! ```
//! use hostfuncs::optimize::{minimize, OptimizeConfig};
//!
//! let report = minimize(&OptimizeConfig::default()).unwrap();
//! assert!((report.x[0] - 0.225).abs() < 1e-3);
//! assert!((report.x[1] - 0.375).abs() < 1e-3);
//! ```

use std::cell::Cell;
use std::time::{Duration, Instant};

use cobyla::{RhoBeg, StopTols};
use tracing::debug;

use crate::errors::{HostError, OptimizeError};
use crate::log_write;
use crate::logs::LogSink;

/// Log file of the optimisation example.
pub const OPTIMIZE_LOG: &str = "example_NLopt.log";

/// Settings of the optimisation example.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeConfig {
    /// Upper bound of each variable and of their sum
    pub m: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Number of times the optimisation is run, each starting where the previous ended
    pub repeats: usize,
    pub xtol_rel: f64,
    pub max_eval: usize,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            m: 0.6,
            alpha: 0.35,
            beta: 0.5,
            repeats: 10,
            xtol_rel: 1e-4,
            max_eval: 500,
        }
    }
}

impl OptimizeConfig {
    fn validate(&self) -> Result<(), OptimizeError> {
        if !(self.m.is_finite() && self.m > 0.0) {
            return Err(OptimizeError::InvalidProblem(format!(
                "m must be positive and finite, got {}",
                self.m
            )));
        }
        if !(self.alpha.is_finite() && self.beta.is_finite()) {
            return Err(OptimizeError::InvalidProblem(
                "alpha and beta must be finite".to_string(),
            ));
        }
        if self.repeats == 0 || self.max_eval == 0 {
            return Err(OptimizeError::InvalidProblem(
                "repeats and max_eval must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of [`minimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeReport {
    /// Location of the minimum
    pub x: [f64; 2],
    /// Objective value at `x`
    pub minf: f64,
    /// Wall-clock time of all repeats
    pub time: Duration,
    /// Time spent inside the objective and the constraint
    pub inside: Duration,
    /// Objective evaluations over all repeats
    pub evals: usize,
    /// Status reported by the optimiser on the last repeat
    pub status: String,
}

/// Runs the optimisation `config.repeats` times.
///
/// # Errors
/// [`OptimizeError::InvalidProblem`] for unusable settings, [`OptimizeError::Failed`]
/// with the optimiser's status and last iterate if any repeat fails.
pub fn minimize(config: &OptimizeConfig) -> Result<OptimizeReport, OptimizeError> {
    config.validate()?;
    let OptimizeConfig { m, alpha, beta, .. } = *config;

    let evals = Cell::new(0usize);
    let inside = Cell::new(Duration::ZERO);

    let objective = |x: &[f64], _: &mut ()| {
        let start = Instant::now();
        let value = (x[0] - alpha).powi(2) + (x[1] - beta).powi(2);
        evals.set(evals.get() + 1);
        inside.set(inside.get() + start.elapsed());
        value
    };
    // COBYLA constraints are satisfied when non-negative
    let sum_constraint = |x: &[f64], _: &mut ()| {
        let start = Instant::now();
        let slack = m - (x[0] + x[1]);
        inside.set(inside.get() + start.elapsed());
        slack
    };

    let bounds = [(0.0, m), (0.0, m)];
    let mut x = vec![m / 2.0, m / 2.0];
    let mut minf = f64::NAN;
    let mut status = String::new();

    let start = Instant::now();
    for repeat in 0..config.repeats {
        let stop = StopTols {
            xtol_rel: config.xtol_rel,
            ..StopTols::default()
        };
        match cobyla::minimize(
            objective,
            &x,
            &bounds,
            &[sum_constraint],
            (),
            config.max_eval,
            RhoBeg::All(m / 4.0),
            Some(stop),
        ) {
            Ok((success, xopt, fopt)) => {
                debug!(repeat, ?success, "optimizer finished");
                status = format!("{success:?}");
                x = xopt;
                minf = fopt;
            }
            Err((fail, xopt, fopt)) => {
                return Err(OptimizeError::Failed {
                    status: format!("{fail:?}"),
                    x: xopt,
                    minf: fopt,
                });
            }
        }
    }
    let time = start.elapsed();

    Ok(OptimizeReport {
        x: [x[0], x[1]],
        minf,
        time,
        inside: inside.get(),
        evals: evals.get(),
        status,
    })
}

/// Runs [`minimize`] and writes the outcome to `sink`.
///
/// The sink is reset first. An optimiser failure is recorded and returned as an error;
/// the outcome is only recorded on success.
pub fn run_logged(config: &OptimizeConfig, sink: &LogSink) -> Result<OptimizeReport, HostError> {
    sink.reset()?;
    match minimize(config) {
        Ok(report) => {
            log_write!(
                sink,
                0,
                "found minimum at f(%g,%g) = %0.10g\n",
                report.x[0],
                report.x[1],
                report.minf
            )?;
            log_write!(
                sink,
                0,
                "time: %5.2f, inside %5.2f, evals = %d\n",
                report.time.as_secs_f64(),
                report.inside.as_secs_f64(),
                report.evals
            )?;
            Ok(report)
        }
        Err(err @ OptimizeError::Failed { .. }) => {
            log_write!(sink, 0, "nlopt failed!\n")?;
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
