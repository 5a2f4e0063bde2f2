//! Damped Newton solver for nonlinear algebraic loops.

use omsi_core::{Matrix, Real, Vector, check_finite};
use tracing::{debug, trace, warn};

use crate::backend::LinearBackend;
use crate::dense::DenseDirect;
use crate::error::{SolverError, SolverResult};
use crate::settings::BackendSettings;

/// Newton solver configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Converged when `||F(x)||_2` falls below this
    pub function_tolerance: Real,
    /// Converged when the applied step is below `step_tolerance * (1 + ||x||)`
    pub step_tolerance: Real,
    /// Line search backtracking factor
    pub line_search_beta: Real,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
    /// Smallest damping factor before the iteration is declared stagnated
    pub min_damping: Real,
    /// Rebuild the Jacobian every this many iterations (1 = always)
    pub jacobian_refresh: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            function_tolerance: 1e-10,
            step_tolerance: 1e-12,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
            min_damping: 1e-10,
            jacobian_refresh: 1,
        }
    }
}

/// Callbacks the Newton iteration drives.
pub trait NonlinearProblem {
    type Error: From<SolverError>;

    /// Evaluate `F(x)` into `f`.
    fn residual(&mut self, x: &[Real], f: &mut [Real]) -> Result<(), Self::Error>;

    /// Evaluate the Jacobian `dF/dx` at `x` into `jac`.
    fn jacobian(&mut self, x: &[Real], jac: &mut Matrix) -> Result<(), Self::Error>;
}

/// Newton iteration result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewtonReport {
    /// Number of iterations
    pub iterations: usize,
    /// Final residual norm
    pub residual_norm: Real,
    /// Norm of the last applied step
    pub step_norm: Real,
    /// Number of Jacobian evaluations
    pub jacobian_evaluations: usize,
}

/// Newton solver with backtracking line search.
///
/// Linear corrections `J dx = -F` are delegated to a [`DenseDirect`] backend.
#[derive(Clone, Debug)]
pub struct Newton {
    n: usize,
    config: NewtonConfig,
    settings: BackendSettings,
    x: Vector,
    jac: Matrix,
    linear: DenseDirect,
}

impl Newton {
    pub fn new(n: usize, config: NewtonConfig, settings: &BackendSettings) -> Self {
        Self {
            n,
            config,
            settings: *settings,
            x: Vector::zeros(n),
            jac: Matrix::zeros(n, n),
            linear: DenseDirect::new(n, settings),
        }
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn prepare(&mut self, n: usize) -> SolverResult<()> {
        self.n = n;
        self.x = Vector::zeros(n);
        self.jac = Matrix::zeros(n, n);
        self.linear.prepare(n)
    }

    /// Entry of the most recent Jacobian.
    pub fn get_matrix_element(&self, row: usize, col: usize) -> SolverResult<Real> {
        Ok(self.jac.get(row, col)?)
    }

    pub fn set_matrix_element(&mut self, row: usize, col: usize, value: Real) -> SolverResult<()> {
        Ok(self.jac.set(row, col, value)?)
    }

    /// Entry of the current iterate (the start value before a solve).
    pub fn get_vector_element(&self, index: usize) -> SolverResult<Real> {
        Ok(self.x.get(index)?)
    }

    pub fn set_vector_element(&mut self, index: usize, value: Real) -> SolverResult<()> {
        Ok(self.x.set(index, value)?)
    }

    pub fn solution(&self) -> &[Real] {
        self.x.as_slice()
    }

    /// Iterate from the loaded start value until convergence.
    ///
    /// On failure the iterate is left at the last accepted point; callers must
    /// not commit it.
    pub fn solve_with<P: NonlinearProblem>(
        &mut self,
        problem: &mut P,
    ) -> Result<NewtonReport, P::Error> {
        let n = self.n;
        let cfg = self.config.clone();
        let mut x = self.x.clone();
        let mut f = Vector::zeros(n);
        problem.residual(x.as_slice(), f.as_mut_slice())?;
        let mut f_norm = check_finite(f.norm(), "initial residual").map_err(SolverError::from)?;

        let mut report = NewtonReport {
            residual_norm: f_norm,
            ..Default::default()
        };
        if f_norm <= cfg.function_tolerance {
            return Ok(report);
        }

        let refresh = cfg.jacobian_refresh.max(1);
        let mut jac_age = refresh;
        let mut x_new = Vector::zeros(n);
        let mut f_new = Vector::zeros(n);

        for iter in 0..cfg.max_iterations {
            if jac_age >= refresh {
                problem.jacobian(x.as_slice(), &mut self.jac)?;
                report.jacobian_evaluations += 1;
                jac_age = 0;
            }
            jac_age += 1;

            let dx = match self.correction(&f) {
                Ok(dx) => dx,
                Err(e) if jac_age > 1 => {
                    debug!(iter, error = %e, "newton: stale Jacobian failed, rebuilding");
                    problem.jacobian(x.as_slice(), &mut self.jac)?;
                    report.jacobian_evaluations += 1;
                    jac_age = 1;
                    self.correction(&f)?
                }
                Err(e) => {
                    self.x = x;
                    return Err(e.into());
                }
            };

            // Backtracking line search on ||F||
            let mut alpha = 1.0;
            x_new.copy_from(&x).map_err(SolverError::from)?;
            x_new.axpy(alpha, &dx).map_err(SolverError::from)?;
            problem.residual(x_new.as_slice(), f_new.as_mut_slice())?;
            let mut f_new_norm = f_new.norm();

            for _ in 0..cfg.max_line_search_iters {
                if f_new_norm.is_finite() && f_new_norm < f_norm {
                    break;
                }
                alpha *= cfg.line_search_beta;
                if alpha < cfg.min_damping {
                    break;
                }
                x_new.copy_from(&x).map_err(SolverError::from)?;
                x_new.axpy(alpha, &dx).map_err(SolverError::from)?;
                problem.residual(x_new.as_slice(), f_new.as_mut_slice())?;
                f_new_norm = f_new.norm();
            }

            if alpha < cfg.min_damping || !f_new_norm.is_finite() {
                warn!(iter, residual = f_norm, "newton: line search stagnated");
                self.x = x;
                return Err(SolverError::ConvergenceFailed {
                    what: format!("Line search stagnated at iteration {iter}"),
                }
                .into());
            }

            let step_norm = alpha * dx.norm();
            std::mem::swap(&mut x, &mut x_new);
            std::mem::swap(&mut f, &mut f_new);
            f_norm = f_new_norm;

            report.iterations = iter + 1;
            report.residual_norm = f_norm;
            report.step_norm = step_norm;
            trace!(iter, residual = f_norm, step = step_norm, damping = alpha, "newton step");

            if f_norm <= cfg.function_tolerance
                || step_norm <= cfg.step_tolerance * (1.0 + x.norm())
            {
                debug!(
                    iterations = report.iterations,
                    residual = f_norm,
                    "newton converged"
                );
                self.x = x;
                return Ok(report);
            }
        }

        warn!(
            iterations = cfg.max_iterations,
            residual = f_norm,
            "newton: maximum iterations reached"
        );
        self.x = x;
        Err(SolverError::MaxIterations {
            iterations: cfg.max_iterations,
            residual: f_norm,
        }
        .into())
    }

    /// Solve `J dx = -f` with the inner dense backend.
    fn correction(&mut self, f: &Vector) -> SolverResult<Vector> {
        let mut rhs = f.clone();
        rhs.negate();
        self.linear.prepare(self.n)?;
        self.linear.load(&self.jac, &rhs)?;
        self.linear
            .set_residual_tolerance(self.settings.residual_tolerance * (1.0 + f.norm()));
        self.linear.solve()?;
        Ok(Vector::from_slice(self.linear.solution()))
    }
}
